//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a minimal (or absent) config file works.

use serde::{Deserialize, Serialize};

/// Root configuration for the chat gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Structured logging configuration.
    pub logging: LoggingConfig,

    /// Span tracking configuration.
    pub tracing: TracingConfig,

    /// Downstream AI provider configuration.
    pub ai: AiConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Deployment environment label (development, production, test).
    pub environment: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// Fixed-window rate limiting configuration.
///
/// The window and request cap used to be hardcoded constants; they are
/// externalized here so tests and deployments can tune them without a rebuild.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per client key per window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 5,
        }
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Threshold level (error, warn, info, http, debug). Calls strictly less
    /// severe than the threshold are suppressed.
    pub level: String,

    /// Directory for the rolling file sinks.
    pub directory: String,

    /// Whether file sinks are enabled (the console sink is always on).
    pub file_sinks_enabled: bool,

    /// Capacity of the in-memory ring of recent entries served by /api/logs.
    pub recent_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_sinks_enabled: true,
            recent_capacity: 1000,
        }
    }
}

/// Span tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Master switch. When off, the tracer hands out no-op spans.
    pub enabled: bool,

    /// Optional exporter endpoint for finished spans (OTLP-style HTTP).
    /// Spans always go to the log sink; this is an additional destination.
    pub exporter_endpoint: Option<String>,

    /// Service name attached to exported spans.
    pub service_name: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exporter_endpoint: None,
            service_name: "chatbot-server".to_string(),
        }
    }
}

/// Downstream AI provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    /// Chat-completions endpoint URL (OpenAI-compatible).
    pub api_url: String,

    /// API key. Empty means the static fallback provider is used.
    pub api_key: String,

    /// Model identifier sent with each request and reported by /api/health.
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for a single downstream call (AI provider, persistence) in seconds.
    pub downstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            downstream_secs: 30,
        }
    }
}
