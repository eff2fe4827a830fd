//! Configuration management for the Zero scanner.
//!
//! Shared settings live in `~/.zero-scanner/config.json`. Service sections
//! (e.g. `scanner.json`) are loaded separately through
//! [`crate::config_loader::load_section`].
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ZERO_LOG_LEVEL` → observability.log_level
//! - `ZERO_LOG_FORMAT` → observability.log_format
//! - `TELEGRAM_TOKEN` → secrets.telegram_bot_token
//! - `TELEGRAM_CHAT_ID` → secrets.telegram_chat_id

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".zero-scanner"),
        |dirs| dirs.home_dir().join(".zero-scanner"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Expand a leading `~` and `$VARS` in a configured path.
///
/// Falls back to the raw string when expansion fails (unknown variable).
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Shared configuration for Zero scanner processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Credentials for external collaborators
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load `config.json` from a specific directory, defaults if absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env(dir: &Path) -> Result<Self> {
        let mut config = Self::load_from_dir(dir)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored so that an exported-but-blank variable does
    /// not wipe a configured value.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = get("ZERO_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = get("ZERO_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(token) = get("TELEGRAM_TOKEN") {
            self.secrets.telegram_bot_token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.secrets.telegram_chat_id = Some(chat_id);
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to filter down to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials for the alert channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Telegram bot token
    #[serde(default)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat that receives scan alerts
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
}

impl SecretsConfig {
    /// Both Telegram credentials are present.
    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.telegram_chat_id.as_deref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
        assert!(!config.secrets.telegram_configured());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ZERO_LOG_LEVEL", "debug"),
            ("TELEGRAM_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-100"),
            ("ZERO_LOG_FORMAT", "  "),
        ]);

        let mut config = Config::default();
        config.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
        assert!(config.secrets.telegram_configured());
    }

    #[test]
    fn test_load_from_dir_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_load_from_dir_with_aliases() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"observability": {"level": "warn", "format": "json"}}"#,
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/reports");
        assert!(expanded.ends_with("reports"));
        assert_eq!(expand_path("plain/path"), PathBuf::from("plain/path"));
    }
}
