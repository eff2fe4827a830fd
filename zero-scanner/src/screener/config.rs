//! Scanner configuration module.
//!
//! `ScannerConfig` is built once at startup from `scanner.json` (merged over
//! the defaults below), environment overrides and validation, then passed by
//! reference to the screens, the evaluator and the pipeline.
//!
//! # Environment Variable Mapping
//!
//! - `MARKETCAP_MIN_CRORE` → thresholds.min_market_cap
//! - `PEG_MAX` → thresholds.max_peg
//! - `PRICE_TO_SALES_MAX` → thresholds.max_price_to_sales
//! - `EV_EBITDA_MAX` → thresholds.max_ev_to_ebitda
//! - `SCANNER_UNIVERSE` → universe.path
//! - `SCANNER_STATE_PATH` → state_path
//! - `SCANNER_PACING_MS` → pacing_ms
//! - `BAD_SYMBOL_RETRY_WINDOW` → universe.retry_window

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use zero_common::config::expand_path;
use zero_common::config_loader::load_section;
use zero_common::util::parse_duration_secs;
use zero_common::validation::require_positive;
use zero_common::{Validate, ValidationError, ValidationResult};

use crate::data::YahooConfig;

// ============================================================================
// Main Scanner Configuration
// ============================================================================

/// Configuration for one scanner pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Universe source and bad-symbol ledger
    #[serde(default)]
    pub universe: UniverseConfig,

    /// Screen thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Market data provider settings
    #[serde(default)]
    pub provider: YahooConfig,

    /// Delay between symbols in milliseconds
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Alert state file
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Market-hours gate for scheduled runs
    #[serde(default)]
    pub market_hours: MarketHoursConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            universe: UniverseConfig::default(),
            thresholds: ThresholdConfig::default(),
            provider: YahooConfig::default(),
            pacing_ms: default_pacing_ms(),
            state_path: default_state_path(),
            market_hours: MarketHoursConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_pacing_ms() -> u64 {
    500
}

fn default_state_path() -> String {
    "~/.zero-scanner/state.json".to_string()
}

impl ScannerConfig {
    /// Load `scanner.json` from `dir` and apply environment overrides.
    pub fn load_with_env(dir: &Path) -> zero_common::Result<Self> {
        let mut config: Self = load_section(dir, "scanner")?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Blank values are ignored. Unparsable numbers are logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_f64 = |key: &str| {
            get(key).and_then(|v| match v.parse::<f64>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(key = key, value = %v, "Ignoring non-numeric override");
                    None
                }
            })
        };

        if let Some(v) = get_f64("MARKETCAP_MIN_CRORE") {
            self.thresholds.min_market_cap = v;
        }
        if let Some(v) = get_f64("PEG_MAX") {
            self.thresholds.max_peg = v;
        }
        if let Some(v) = get_f64("PRICE_TO_SALES_MAX") {
            self.thresholds.max_price_to_sales = v;
        }
        if let Some(v) = get_f64("EV_EBITDA_MAX") {
            self.thresholds.max_ev_to_ebitda = v;
        }
        if let Some(path) = get("SCANNER_UNIVERSE") {
            self.universe.path = path;
        }
        if let Some(path) = get("SCANNER_STATE_PATH") {
            self.state_path = path;
        }
        if let Some(v) = get("SCANNER_PACING_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.pacing_ms = ms,
                Err(_) => warn!(value = %v, "Ignoring invalid SCANNER_PACING_MS"),
            }
        }
        if let Some(window) = get("BAD_SYMBOL_RETRY_WINDOW") {
            self.universe.retry_window = window;
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn state_file(&self) -> PathBuf {
        expand_path(&self.state_path)
    }
}

impl Validate for ScannerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.thresholds.validate() {
            errors.push(e);
        }
        if let Err(e) = self.universe.validate() {
            errors.push(e);
        }
        if let Err(e) = self.market_hours.validate() {
            errors.push(e);
        }
        if self.state_path.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "state_path".into(),
            });
        }
        if self.provider.base_url.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "provider.base_url".into(),
            });
        }
        for format in &self.output.report_format {
            if !matches!(format.as_str(), "markdown" | "md" | "json") {
                errors.push(ValidationError::invalid(
                    "output.report_format",
                    format!("unknown format '{}'", format),
                ));
            }
        }

        ValidationError::collect(errors)
    }
}

// ============================================================================
// Universe Configuration
// ============================================================================

/// Universe source and bad-symbol ledger location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Text file with one symbol per line
    #[serde(default = "default_universe_path")]
    pub path: String,

    /// Bad-symbol ledger file (`SYMBOL|YYYY-MM-DD` per line)
    #[serde(default = "default_bad_symbols_path")]
    pub bad_symbols_path: String,

    /// How long a marked symbol is skipped (e.g. "7d")
    #[serde(default = "default_retry_window")]
    pub retry_window: String,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            path: default_universe_path(),
            bad_symbols_path: default_bad_symbols_path(),
            retry_window: default_retry_window(),
        }
    }
}

fn default_universe_path() -> String {
    "~/.zero-scanner/universe.csv".to_string()
}

fn default_bad_symbols_path() -> String {
    "~/.zero-scanner/bad_symbols.txt".to_string()
}

fn default_retry_window() -> String {
    "7d".to_string()
}

impl UniverseConfig {
    pub fn universe_file(&self) -> PathBuf {
        expand_path(&self.path)
    }

    pub fn ledger_file(&self) -> PathBuf {
        expand_path(&self.bad_symbols_path)
    }

    /// Parsed retry window. Falls back to seven days on a malformed value;
    /// validation reports the malformed value separately.
    pub fn retry_window(&self) -> chrono::Duration {
        parse_duration_secs(&self.retry_window)
            .ok()
            .and_then(|secs| chrono::Duration::try_seconds(i64::try_from(secs).ok()?))
            .unwrap_or_else(|| chrono::Duration::days(7))
    }
}

impl Validate for UniverseConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.path.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "universe.path".into(),
            });
        }
        parse_duration_secs(&self.retry_window)
            .map(|_| ())
            .map_err(|reason| ValidationError::invalid("universe.retry_window", reason))
    }
}

// ============================================================================
// Threshold Configuration
// ============================================================================

/// Fundamental screen thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum market cap, in units of `market_cap_unit` (default crore)
    #[serde(default = "default_min_market_cap")]
    pub min_market_cap: f64,

    /// Divisor converting the provider's market cap into threshold units
    #[serde(default = "default_market_cap_unit")]
    pub market_cap_unit: f64,

    /// PEG must be strictly below this when present
    #[serde(default = "default_max_peg")]
    pub max_peg: f64,

    /// Price-to-sales ceiling (inclusive) when present
    #[serde(default = "default_max_price_to_sales")]
    pub max_price_to_sales: f64,

    /// EV/EBITDA ceiling (inclusive) when present
    #[serde(default = "default_max_ev_to_ebitda")]
    pub max_ev_to_ebitda: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_market_cap: default_min_market_cap(),
            market_cap_unit: default_market_cap_unit(),
            max_peg: default_max_peg(),
            max_price_to_sales: default_max_price_to_sales(),
            max_ev_to_ebitda: default_max_ev_to_ebitda(),
        }
    }
}

fn default_min_market_cap() -> f64 {
    1000.0 // 1000 crore
}

fn default_market_cap_unit() -> f64 {
    1e7 // 1 crore
}

fn default_max_peg() -> f64 {
    1.0
}

fn default_max_price_to_sales() -> f64 {
    10.0
}

fn default_max_ev_to_ebitda() -> f64 {
    25.0
}

impl Validate for ThresholdConfig {
    fn validate(&self) -> ValidationResult<()> {
        let errors: Vec<ValidationError> = [
            ("thresholds.min_market_cap", self.min_market_cap),
            ("thresholds.market_cap_unit", self.market_cap_unit),
            ("thresholds.max_peg", self.max_peg),
            ("thresholds.max_price_to_sales", self.max_price_to_sales),
            ("thresholds.max_ev_to_ebitda", self.max_ev_to_ebitda),
        ]
        .into_iter()
        .filter_map(|(field, value)| require_positive(field, value).err())
        .collect();

        ValidationError::collect(errors)
    }
}

// ============================================================================
// Market Hours Configuration
// ============================================================================

/// Trading session window for scheduled runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketHoursConfig {
    /// Whether scheduled runs are gated at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exchange offset from UTC in minutes (IST = +330)
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Session open, local "HH:MM"
    #[serde(default = "default_open")]
    pub open: String,

    /// Session close, local "HH:MM" (inclusive)
    #[serde(default = "default_close")]
    pub close: String,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            utc_offset_minutes: default_utc_offset_minutes(),
            open: default_open(),
            close: default_close(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_utc_offset_minutes() -> i32 {
    330
}

fn default_open() -> String {
    "09:00".to_string()
}

fn default_close() -> String {
    "15:30".to_string()
}

impl Validate for MarketHoursConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        let parse = |s: &str| chrono::NaiveTime::parse_from_str(s, "%H:%M");

        match (parse(&self.open), parse(&self.close)) {
            (Ok(open), Ok(close)) if open < close => {}
            (Ok(_), Ok(_)) => errors.push(ValidationError::Conflict {
                reason: "market_hours.open must be before market_hours.close".into(),
            }),
            (open, close) => {
                if open.is_err() {
                    errors.push(ValidationError::invalid("market_hours.open", "expected HH:MM"));
                }
                if close.is_err() {
                    errors.push(ValidationError::invalid("market_hours.close", "expected HH:MM"));
                }
            }
        }

        if self.utc_offset_minutes.abs() >= 24 * 60 {
            errors.push(ValidationError::invalid(
                "market_hours.utc_offset_minutes",
                "must be within +/- 24h",
            ));
        }

        ValidationError::collect(errors)
    }
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Output configuration for scan results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one CSV per result table
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Whether to save local report files
    #[serde(default = "default_true")]
    pub local_report_enabled: bool,

    /// Directory for local reports
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    /// Report formats to generate
    #[serde(default = "default_report_formats")]
    pub report_format: Vec<String>,

    /// Telegram Bot API base URL
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,

    /// Delivery attempts per alert
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            local_report_enabled: true,
            report_dir: default_report_dir(),
            report_format: default_report_formats(),
            telegram_api_base: default_telegram_api_base(),
            retry_count: default_retry_count(),
        }
    }
}

fn default_results_dir() -> String {
    "~/.zero-scanner/results".to_string()
}

fn default_report_dir() -> String {
    "~/.zero-scanner/reports".to_string()
}

fn default_report_formats() -> Vec<String> {
    vec!["markdown".to_string(), "json".to_string()]
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_retry_count() -> u32 {
    3
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert!((config.thresholds.min_market_cap - 1000.0).abs() < 0.001);
        assert!((config.thresholds.market_cap_unit - 1e7).abs() < 0.001);
        assert!((config.thresholds.max_peg - 1.0).abs() < 0.001);
        assert!((config.thresholds.max_price_to_sales - 10.0).abs() < 0.001);
        assert!((config.thresholds.max_ev_to_ebitda - 25.0).abs() < 0.001);
        assert_eq!(config.pacing_ms, 500);
        assert_eq!(config.market_hours.utc_offset_minutes, 330);
        assert_eq!(config.universe.retry_window(), chrono::Duration::days(7));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ScannerConfig::default();
        config.apply_overrides_from(lookup(&[
            ("MARKETCAP_MIN_CRORE", "500"),
            ("PEG_MAX", "1.5"),
            ("PRICE_TO_SALES_MAX", "8"),
            ("EV_EBITDA_MAX", "30"),
            ("SCANNER_UNIVERSE", "/tmp/u.csv"),
            ("SCANNER_PACING_MS", "0"),
            ("BAD_SYMBOL_RETRY_WINDOW", "3d"),
        ]));

        assert!((config.thresholds.min_market_cap - 500.0).abs() < 0.001);
        assert!((config.thresholds.max_peg - 1.5).abs() < 0.001);
        assert!((config.thresholds.max_price_to_sales - 8.0).abs() < 0.001);
        assert!((config.thresholds.max_ev_to_ebitda - 30.0).abs() < 0.001);
        assert_eq!(config.universe.path, "/tmp/u.csv");
        assert_eq!(config.pacing(), Duration::ZERO);
        assert_eq!(config.universe.retry_window(), chrono::Duration::days(3));
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut config = ScannerConfig::default();
        config.apply_overrides_from(lookup(&[
            ("PEG_MAX", "cheap"),
            ("SCANNER_PACING_MS", "-5"),
            ("SCANNER_STATE_PATH", "   "),
        ]));
        assert!((config.thresholds.max_peg - 1.0).abs() < 0.001);
        assert_eq!(config.pacing_ms, 500);
        assert_eq!(config.state_path, default_state_path());
    }

    #[test]
    fn test_validation_rejects_bad_thresholds() {
        let mut config = ScannerConfig::default();
        config.thresholds.max_peg = 0.0;
        config.universe.retry_window = "soon".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Multiple(ref v) if v.len() == 2));
    }

    #[test]
    fn test_validation_market_hours_order() {
        let mut hours = MarketHoursConfig::default();
        hours.open = "16:00".into();
        assert!(matches!(hours.validate(), Err(ValidationError::Conflict { .. })));

        hours.open = "9am".into();
        assert!(matches!(hours.validate(), Err(ValidationError::InvalidValue { .. })));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: ScannerConfig =
            serde_json::from_str(r#"{"thresholds": {"max_peg": 2.0}, "pacing_ms": 100}"#).unwrap();
        assert!((parsed.thresholds.max_peg - 2.0).abs() < 0.001);
        assert!((parsed.thresholds.min_market_cap - 1000.0).abs() < 0.001);
        assert_eq!(parsed.pacing_ms, 100);
        assert_eq!(parsed.output.retry_count, 3);
    }

    #[test]
    fn test_load_with_env_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scanner.json"),
            r#"{"universe": {"path": "/data/nifty.csv"}}"#,
        )
        .unwrap();

        let config = ScannerConfig::load_with_env(dir.path()).unwrap();
        assert!(config.universe.path.ends_with(".csv"));
        assert_eq!(config.universe.retry_window, "7d");
    }
}
