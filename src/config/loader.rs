//! Configuration loading from disk and environment.

use std::env;
use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build configuration from defaults plus environment overrides.
///
/// Used when no config file is given; mirrors the env-driven setup of the
/// original deployment.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(port) = env::var("PORT") {
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    if let Ok(level) = env::var("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(dir) = env::var("LOG_DIR") {
        config.logging.directory = dir;
    }
    if let Ok(model) = env::var("AI_MODEL") {
        config.ai.model = model;
    }
    if let Ok(url) = env::var("AI_API_URL") {
        config.ai.api_url = url;
    }
    if let Ok(key) = env::var("AI_API_KEY") {
        config.ai.api_key = key;
    }
    if let Ok(enabled) = env::var("TRACING_ENABLED") {
        config.tracing.enabled = enabled != "false" && enabled != "0";
    }
    if let Ok(endpoint) = env::var("OTLP_ENDPOINT") {
        config.tracing.exporter_endpoint = Some(endpoint);
    }
    if let Ok(window) = env::var("RATE_LIMIT_WINDOW_MS") {
        if let Ok(ms) = window.parse() {
            config.rate_limit.window_ms = ms;
        }
    }
    if let Ok(max) = env::var("RATE_LIMIT_MAX_REQUESTS") {
        if let Ok(n) = max.parse() {
            config.rate_limit.max_requests = n;
        }
    }
    if let Ok(environment) = env::var("APP_ENV") {
        config.environment = environment;
    }
    if config.environment.is_empty() {
        config.environment = "development".to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(
            &path,
            r#"
[listener]
bind_address = "127.0.0.1:9000"

[rate_limit]
window_ms = 1000
max_requests = 3
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.rate_limit.max_requests, 3);
        // Untouched sections keep defaults
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
    }

    #[test]
    fn rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(&path, "[rate_limit]\nwindow_ms = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
