//! Configuration validation.
//!
//! Serde handles syntactic validation; this module covers the semantic
//! checks (value ranges, recognized level names, parseable addresses).
//! All errors are collected and returned together, not just the first.

use std::fmt;

use crate::config::schema::GatewayConfig;
use crate::observability::logging::LogLevel;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address".to_string(),
            message: format!("not a valid socket address: {}", config.listener.bind_address),
        });
    }

    if config.rate_limit.window_ms == 0 {
        errors.push(ValidationError {
            field: "rate_limit.window_ms".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError {
            field: "rate_limit.max_requests".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.logging.level.parse::<LogLevel>().is_err() {
        errors.push(ValidationError {
            field: "logging.level".to_string(),
            message: format!("unrecognized level: {}", config.logging.level),
        });
    }
    if config.logging.recent_capacity == 0 {
        errors.push(ValidationError {
            field: "logging.recent_capacity".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.request_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if config.timeouts.downstream_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.downstream_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
