//! Parser configuration.
//!
//! Resolved once at startup (from a JSON file, a JSON string handed over the
//! FFI, or defaults) and passed into [`crate::report::ReportParser`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;
use pulmocare_llm::MIN_RESPONSE_LEN;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for report parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Responses shorter than this many characters are rejected as empty
    pub min_response_len: usize,
    /// Backoff for the upstream request
    pub retry: RetryPolicy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            min_response_len: MIN_RESPONSE_LEN,
            retry: RetryPolicy::default(),
        }
    }
}

impl ParserConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_response_len == 0 {
            return Err(ConfigError::Invalid("min_response_len must be at least 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.factor.is_nan() || self.retry.factor < 1.0 {
            return Err(ConfigError::Invalid("retry.factor must be at least 1.0".into()));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms cannot exceed retry.max_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.min_response_len, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ParserConfig::from_json_str(r#"{"retry": {"max_attempts": 5}}"#).unwrap();
        assert_eq!(config.min_response_len, 10);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1_000);

        assert_eq!(ParserConfig::from_json_str("{}").unwrap(), ParserConfig::default());
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            r#"{"min_response_len": 0}"#,
            r#"{"retry": {"max_attempts": 0}}"#,
            r#"{"retry": {"factor": 0.5}}"#,
            r#"{"retry": {"initial_delay_ms": 30000, "max_delay_ms": 1000}}"#,
        ];
        for json in cases {
            assert!(
                matches!(ParserConfig::from_json_str(json), Err(ConfigError::Invalid(_))),
                "{} should be rejected",
                json
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ParserConfig::from_json_str("{min_response_len: 3"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_response_len": 20}}"#).unwrap();

        let config = ParserConfig::load(file.path()).unwrap();
        assert_eq!(config.min_response_len, 20);

        assert!(matches!(
            ParserConfig::load("/nonexistent/pulmocare.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
