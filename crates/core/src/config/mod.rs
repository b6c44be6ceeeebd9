mod loader;
mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::{ClientConfig, Config};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Validate configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.client.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "client.host cannot be empty".to_string(),
        ));
    }
    if config.client.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "client.timeout_secs cannot be 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_host_fails() {
        let config = Config {
            client: ClientConfig {
                host: "  ".to_string(),
                ..ClientConfig::default()
            },
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let config = Config {
            client: ClientConfig {
                timeout_secs: 0,
                ..ClientConfig::default()
            },
        };
        assert!(validate_config(&config).is_err());
    }
}
