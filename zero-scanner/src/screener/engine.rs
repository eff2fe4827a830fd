//! Universe evaluator.
//!
//! Walks the universe in order, one symbol at a time: fetch fundamentals and
//! price history, normalize both, merge, then classify the record into the
//! screening lists. A symbol whose data cannot be fetched still appears in
//! the `All` list with absent fields and is reported in
//! [`ScanResult::unavailable`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::ScannerConfig;
use super::rules::{FundamentalStrength, Retest200, Screen, ScreenKind, Trending};
use crate::data::{MarketDataProvider, PriceSeries};
use crate::error::ScanError;
use crate::fundamentals::FundamentalSnapshot;
use crate::indicators::TechnicalSnapshot;
use crate::record::SymbolRecord;

/// Table holding every evaluated symbol.
pub const ALL_TABLE: &str = "AllStocks";

/// Upper bound on a provider-requested hold-off between symbols.
const MAX_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

// ============================================================================
// Filter Result
// ============================================================================

/// Pass-through counts for one screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
    /// Screen applied
    pub screen: ScreenKind,
    /// Records the screen was applied to
    pub input: usize,
    /// Records that passed
    pub passed: usize,
    /// Pass rate (%)
    pub pass_rate: f64,
}

impl FilterResult {
    pub fn new(screen: ScreenKind, input: usize, passed: usize) -> Self {
        let pass_rate = if input > 0 {
            (passed as f64 / input as f64) * 100.0
        } else {
            0.0
        };

        Self {
            screen,
            input,
            passed,
            pass_rate,
        }
    }
}

/// A symbol whose provider data could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableSymbol {
    pub symbol: String,
    pub reason: String,
}

// ============================================================================
// Scan Result
// ============================================================================

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Scan ID (timestamp-based)
    pub id: String,
    /// Every evaluated record, sorted by symbol
    pub all: Vec<SymbolRecord>,
    /// Records passing Fundamental-Strength, in universe order
    pub fundamental_strong: Vec<SymbolRecord>,
    /// Strong records passing Trending, in universe order
    pub trending: Vec<SymbolRecord>,
    /// Strong records passing Retest200, in universe order
    pub retest200: Vec<SymbolRecord>,
    /// Symbols whose data could not be fetched
    pub unavailable: Vec<UnavailableSymbol>,
    /// Per-screen counts
    pub filter_results: Vec<FilterResult>,
    /// Total symbols evaluated
    pub total_scanned: usize,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: DateTime<Utc>,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl ScanResult {
    /// Members of a screening list.
    pub fn members(&self, screen: ScreenKind) -> &[SymbolRecord] {
        match screen {
            ScreenKind::FundamentalStrong => &self.fundamental_strong,
            ScreenKind::Trending => &self.trending,
            ScreenKind::Retest200 => &self.retest200,
        }
    }

    /// Member symbols of a screening list, in list order.
    pub fn symbols(&self, screen: ScreenKind) -> Vec<String> {
        self.members(screen).iter().map(|r| r.symbol.clone()).collect()
    }

    /// Result tables in write order.
    pub fn tables(&self) -> [(&'static str, &[SymbolRecord]); 4] {
        [
            (ALL_TABLE, self.all.as_slice()),
            (ScreenKind::FundamentalStrong.table(), self.fundamental_strong.as_slice()),
            (ScreenKind::Trending.table(), self.trending.as_slice()),
            (ScreenKind::Retest200.table(), self.retest200.as_slice()),
        ]
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} symbols in {:.1}s: {} strong, {} trending, {} retest200, {} unavailable",
            self.total_scanned,
            self.duration_secs,
            self.fundamental_strong.len(),
            self.trending.len(),
            self.retest200.len(),
            self.unavailable.len()
        )
    }
}

// ============================================================================
// Universe Evaluator
// ============================================================================

/// One evaluated symbol.
#[derive(Debug)]
pub struct SymbolEvaluation {
    pub record: SymbolRecord,
    pub errors: Vec<ScanError>,
    /// Hold-off requested by the provider while fetching this symbol
    pub retry_after: Option<Duration>,
}

/// Evaluates a universe of symbols against the screens.
pub struct UniverseEvaluator<P: MarketDataProvider + ?Sized> {
    provider: Arc<P>,
    fundamental: FundamentalStrength,
    trending: Trending,
    retest: Retest200,
    pacing: Duration,
}

impl<P: MarketDataProvider + ?Sized> UniverseEvaluator<P> {
    pub fn new(provider: Arc<P>, config: &ScannerConfig) -> Self {
        Self {
            provider,
            fundamental: FundamentalStrength::new(config.thresholds.clone()),
            trending: Trending,
            retest: Retest200,
            pacing: config.pacing(),
        }
    }

    /// Evaluate every symbol in order and classify the results.
    pub async fn evaluate(&self, universe: &[String]) -> ScanResult {
        let started_at = Utc::now();
        let id = format!("scan_{}", started_at.format("%Y%m%d_%H%M%S"));

        info!(
            scan_id = %id,
            symbols = universe.len(),
            provider = self.provider.name(),
            "Starting universe evaluation"
        );

        let mut records = Vec::with_capacity(universe.len());
        let mut unavailable = Vec::new();

        let mut delay = self.pacing;
        for (i, symbol) in universe.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let SymbolEvaluation {
                record,
                errors,
                retry_after,
            } = self.evaluate_symbol(symbol).await;

            delay = next_delay(self.pacing, retry_after);
            if delay > self.pacing {
                warn!(symbol = %symbol, delay_ms = delay.as_millis() as u64, "Provider rate limited, backing off");
            }

            if !errors.is_empty() {
                let reason = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                unavailable.push(UnavailableSymbol {
                    symbol: symbol.clone(),
                    reason,
                });
            }
            records.push(record);
        }

        let mut result = self.classify(id, records, started_at);
        result.unavailable = unavailable;

        info!(scan_id = %result.id, "{}", result.summary());
        result
    }

    /// Fetch and merge one symbol. Fetch failures degrade to absent fields
    /// and are returned alongside the record.
    ///
    /// A fundamentals payload that carries fields but none of the screened
    /// ratios (ETFs, indices) is not a failure.
    pub async fn evaluate_symbol(&self, symbol: &str) -> SymbolEvaluation {
        let mut errors = Vec::new();
        let mut retry_after = None;

        let fundamentals = match self.provider.fetch_fundamentals(symbol).await {
            Ok(raw) if is_blank_payload(&raw) => {
                errors.push(unavailable(symbol, "no fundamentals"));
                FundamentalSnapshot::default()
            }
            Ok(raw) => FundamentalSnapshot::from_raw(&raw),
            Err(e) => {
                retry_after = retry_after.max(e.retry_after());
                errors.push(unavailable(symbol, format!("fundamentals fetch failed: {}", e)));
                FundamentalSnapshot::default()
            }
        };

        let technicals = match self.provider.fetch_price_history(symbol).await {
            Ok(bars) if bars.is_empty() => {
                errors.push(unavailable(symbol, "no price data"));
                TechnicalSnapshot::default()
            }
            Ok(bars) => TechnicalSnapshot::from_series(&PriceSeries::new(symbol, bars)),
            Err(e) => {
                retry_after = retry_after.max(e.retry_after());
                errors.push(unavailable(symbol, format!("price history fetch failed: {}", e)));
                TechnicalSnapshot::default()
            }
        };

        for e in &errors {
            warn!(symbol = symbol, error = %e, "Symbol data unavailable");
        }

        SymbolEvaluation {
            record: SymbolRecord::new(symbol, fundamentals, technicals),
            errors,
            retry_after,
        }
    }

    /// Run the screens over evaluated records.
    ///
    /// Trending and Retest200 only see Fundamental-Strong records. List order
    /// follows `records`; `all` is additionally sorted by symbol.
    pub fn classify(
        &self,
        id: String,
        records: Vec<SymbolRecord>,
        started_at: DateTime<Utc>,
    ) -> ScanResult {
        let mut fundamental_strong = Vec::new();
        let mut trending = Vec::new();
        let mut retest200 = Vec::new();

        for record in &records {
            if !self.passes_logged(&self.fundamental, record) {
                continue;
            }
            if self.passes_logged(&self.trending, record) {
                trending.push(record.clone());
            }
            if self.passes_logged(&self.retest, record) {
                retest200.push(record.clone());
            }
            fundamental_strong.push(record.clone());
        }

        let filter_results = vec![
            FilterResult::new(ScreenKind::FundamentalStrong, records.len(), fundamental_strong.len()),
            FilterResult::new(ScreenKind::Trending, fundamental_strong.len(), trending.len()),
            FilterResult::new(ScreenKind::Retest200, fundamental_strong.len(), retest200.len()),
        ];

        let mut all = records;
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        ScanResult {
            id,
            total_scanned: all.len(),
            all,
            fundamental_strong,
            trending,
            retest200,
            unavailable: Vec::new(),
            filter_results,
            started_at,
            completed_at,
            duration_secs,
        }
    }

    fn passes_logged(&self, screen: &dyn Screen, record: &SymbolRecord) -> bool {
        match screen.check(record) {
            Ok(()) => true,
            Err(rejection) => {
                if rejection.is_missing_data() {
                    let err = ScanError::ScreenEvaluation {
                        symbol: record.symbol.clone(),
                        screen: screen.kind(),
                        rejection,
                    };
                    debug!(symbol = %record.symbol, "{}", err);
                }
                false
            }
        }
    }
}

/// Null, non-object or `{}`: the provider had nothing for the symbol.
fn is_blank_payload(raw: &Value) -> bool {
    raw.as_object().map_or(true, |m| m.is_empty())
}

/// Delay before the next symbol: the pacing delay, stretched to honor a
/// rate-limit hold-off (capped).
fn next_delay(pacing: Duration, retry_after: Option<Duration>) -> Duration {
    retry_after.map_or(pacing, |r| pacing.max(r.min(MAX_RATE_LIMIT_BACKOFF)))
}

fn unavailable(symbol: &str, reason: impl Into<String>) -> ScanError {
    ScanError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::bars_from;
    use crate::data::{Candle, ProviderError};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct NullProvider;

    #[async_trait]
    impl MarketDataProvider for NullProvider {
        fn name(&self) -> &'static str {
            "null"
        }

        async fn fetch_price_history(&self, symbol: &str) -> Result<Vec<Candle>, ProviderError> {
            match symbol {
                "NIFTYBEES.NS" => {
                    let closes: Vec<f64> = (0..30).map(|i| 250.0 + i as f64).collect();
                    Ok(bars_from(&closes, &[1000.0; 30]))
                }
                "LIMITED" => Err(ProviderError::RateLimited {
                    retry_after_secs: Some(5),
                }),
                _ => Ok(Vec::new()),
            }
        }

        async fn fetch_fundamentals(&self, symbol: &str) -> Result<Value, ProviderError> {
            match symbol {
                "DOWN" => Err(ProviderError::Network("connection reset".into())),
                "NIFTYBEES.NS" => Ok(json!({"symbol": "NIFTYBEES.NS", "currency": "INR", "quoteType": "ETF"})),
                "BLANK" => Ok(json!({})),
                "NULL" => Ok(Value::Null),
                _ => Ok(json!({"marketCap": 1.0})),
            }
        }
    }

    fn evaluator() -> UniverseEvaluator<NullProvider> {
        let config = ScannerConfig {
            pacing_ms: 0,
            ..Default::default()
        };
        UniverseEvaluator::new(Arc::new(NullProvider), &config)
    }

    fn strong(symbol: &str, technicals: TechnicalSnapshot) -> SymbolRecord {
        SymbolRecord::new(
            symbol,
            FundamentalSnapshot {
                market_cap: Some(5e10),
                ..Default::default()
            },
            technicals,
        )
    }

    fn trending_technicals() -> TechnicalSnapshot {
        TechnicalSnapshot {
            latest_close: Some(110.0),
            sma50: Some(100.0),
            sma200: Some(90.0),
            rsi14: Some(65.0),
            low_52w: Some(80.0),
            volume: Some(200_000.0),
            avgvol1w: Some(100_000.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_result_rate() {
        let r = FilterResult::new(ScreenKind::Trending, 4, 1);
        assert!((r.pass_rate - 25.0).abs() < 1e-9);
        assert_eq!(FilterResult::new(ScreenKind::Trending, 0, 0).pass_rate, 0.0);
    }

    #[test]
    fn test_classify_orders_and_gates() {
        let records = vec![
            strong("ZZZ", trending_technicals()),
            SymbolRecord::unavailable("MMM"),
            strong("AAA", TechnicalSnapshot::default()),
            // Technically trending but no market cap: never classified
            SymbolRecord::new("BBB", FundamentalSnapshot::default(), trending_technicals()),
        ];

        let result = evaluator().classify("scan_test".into(), records, Utc::now());

        let all: Vec<&str> = result.all.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(all, vec!["AAA", "BBB", "MMM", "ZZZ"]);
        assert_eq!(result.symbols(ScreenKind::FundamentalStrong), vec!["ZZZ", "AAA"]);
        assert_eq!(result.symbols(ScreenKind::Trending), vec!["ZZZ"]);
        assert!(result.retest200.is_empty());
        assert_eq!(result.total_scanned, 4);
        assert_eq!(result.filter_results[0].passed, 2);
        assert_eq!(result.filter_results[1].input, 2);
    }

    #[test]
    fn test_tables_names() {
        let result = evaluator().classify("scan_test".into(), Vec::new(), Utc::now());
        let names: Vec<&str> = result.tables().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["AllStocks", "Fundamental_Strong", "Trending", "Retest200"]);
    }

    #[tokio::test]
    async fn test_evaluate_symbol_degrades_on_failure() {
        let SymbolEvaluation { record, errors, retry_after } = evaluator().evaluate_symbol("DOWN").await;
        assert_eq!(record.symbol, "DOWN");
        assert!(record.fundamentals.is_empty());
        assert!(record.technicals.is_empty());
        // Fundamentals failed and the price history was empty
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, ScanError::DataUnavailable { .. })));
        assert_eq!(retry_after, None);
    }

    #[tokio::test]
    async fn test_payload_without_screened_fields_is_available() {
        let eval = evaluator().evaluate_symbol("NIFTYBEES.NS").await;
        assert!(eval.errors.is_empty());
        assert!(eval.record.fundamentals.is_empty());
        assert_eq!(eval.record.technicals.latest_close, Some(279.0));

        let result = evaluator().evaluate(&["NIFTYBEES.NS".to_string()]).await;
        assert!(result.unavailable.is_empty());
        assert_eq!(result.symbols(ScreenKind::FundamentalStrong), Vec::<String>::new());
        assert_eq!(result.all.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_payloads_are_unavailable() {
        for symbol in ["BLANK", "NULL"] {
            let eval = evaluator().evaluate_symbol(symbol).await;
            assert!(eval.errors.iter().any(|e| e.to_string().contains("no fundamentals")));
        }
    }

    #[tokio::test]
    async fn test_rate_limit_reports_hold_off() {
        let eval = evaluator().evaluate_symbol("LIMITED").await;
        assert_eq!(eval.retry_after, Some(Duration::from_secs(5)));
        assert_eq!(eval.errors.len(), 1);
    }

    #[test]
    fn test_next_delay_honors_rate_limit() {
        let pacing = Duration::from_millis(500);
        assert_eq!(next_delay(pacing, None), pacing);
        assert_eq!(next_delay(pacing, Some(Duration::from_millis(100))), pacing);
        assert_eq!(next_delay(pacing, Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(next_delay(pacing, Some(Duration::from_secs(600))), MAX_RATE_LIMIT_BACKOFF);
    }

    #[tokio::test]
    async fn test_evaluate_reports_unavailable() {
        let universe = vec!["UP".to_string(), "DOWN".to_string()];
        let result = evaluator().evaluate(&universe).await;

        assert_eq!(result.all.len(), 2);
        assert_eq!(result.unavailable.len(), 2);
        assert!(result.unavailable[1].reason.contains("connection reset"));
        assert!(result.id.starts_with("scan_"));
    }
}
