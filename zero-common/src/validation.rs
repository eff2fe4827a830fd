//! Configuration validation.
//!
//! Provides validation logic for configuration fields to ensure
//! all required values are present and within valid ranges.

use thiserror::Error;

use crate::config::{Config, ObservabilityConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Shorthand for an `InvalidValue` error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of errors into a single result.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Require a finite, strictly positive number.
pub fn require_positive(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::invalid(field, format!("must be a positive number, got {}", value)))
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty"];

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        // Directive strings like "info,zero_scanner=debug" are allowed; check the base level only.
        let base = self.log_level.split(',').next().unwrap_or("").trim();
        if !LOG_LEVELS.contains(&base.to_lowercase().as_str()) {
            errors.push(ValidationError::invalid(
                "observability.log_level",
                format!("expected one of {:?}, got '{}'", LOG_LEVELS, self.log_level),
            ));
        }

        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            errors.push(ValidationError::invalid(
                "observability.log_format",
                format!("expected one of {:?}, got '{}'", LOG_FORMATS, self.log_format),
            ));
        }

        ValidationError::collect(errors)
    }
}

impl Config {
    /// Validate the shared configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }

        if self.secrets.telegram_bot_token.is_some() != self.secrets.telegram_chat_id.is_some() {
            errors.push(ValidationError::Conflict {
                reason: "telegram_bot_token and telegram_chat_id must be set together".into(),
            });
        }

        ValidationError::collect(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "loud".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_directive_log_level_accepted() {
        let mut config = Config::default();
        config.observability.log_level = "info,zero_scanner=debug".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_half_configured_telegram() {
        let mut config = Config::default();
        config.secrets.telegram_bot_token = Some("123:abc".into());
        config.observability.log_format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Multiple(ref v) if v.len() == 2));
    }

    #[test]
    fn test_require_positive() {
        assert!(require_positive("x", 1.0).is_ok());
        assert!(require_positive("x", 0.0).is_err());
        assert!(require_positive("x", f64::NAN).is_err());
    }
}
