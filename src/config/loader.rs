//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::DispatchConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<DispatchConfig, ConfigError> {
    let config: DispatchConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DispatchConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_joined() {
        let err = parse_config(
            r#"
            [service]
            name = ""
            [retries]
            max_attempts = 0
            "#,
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Validation failed: service.name must not be empty, retries.max_attempts must be greater than zero"
        );
    }

    #[test]
    fn test_huge_breaker_window_rejected() {
        let err = parse_config("[breaker]\ninterval_secs = 9223372036854775807").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ref errors) if matches!(
                errors.as_slice(),
                [ValidationError::TooLarge { field: "breaker.interval_secs", .. }]
            )
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[breaker]\nfailure_threshold = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/dispatch.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
