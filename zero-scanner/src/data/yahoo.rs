//! Yahoo Finance adapter for daily bars and fundamentals.
//!
//! # Endpoints
//! - Chart: `/v8/finance/chart/{symbol}?range=1y&interval=1d`
//! - Quote summary: `/v10/finance/quoteSummary/{symbol}?modules=...`
//!
//! The chart endpoint returns parallel arrays (timestamps plus one array per
//! OHLCV field) in which any sample may be `null`; such sessions are dropped.
//! Quote summary modules are flattened into a single JSON object so the
//! fundamental normalizer sees one flat field namespace.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use zero_common::util::truncate_with_ellipsis;

use super::provider::{MarketDataProvider, ProviderError};
use super::Candle;

// ============================================================================
// Constants
// ============================================================================

/// Yahoo Finance query host
const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

/// Chart endpoint prefix
const CHART_ENDPOINT: &str = "/v8/finance/chart";

/// Quote summary endpoint prefix
const QUOTE_SUMMARY_ENDPOINT: &str = "/v10/finance/quoteSummary";

/// Quote summary modules carrying the fields the screens use
const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,financialData,price";

/// Retry hint after HTTP 429 (seconds)
const RATE_LIMIT_RETRY_SECS: u64 = 5;

// ============================================================================
// Configuration
// ============================================================================

/// Yahoo adapter configuration (`provider` section of `scanner.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chart range (Yahoo vocabulary, e.g. "1y")
    #[serde(default = "default_range")]
    pub range: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    YAHOO_API_BASE.to_string()
}

fn default_range() -> String {
    "1y".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            range: default_range(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<Map<String, Value>>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

impl YahooError {
    fn message(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("{}: {}", code, desc),
            (Some(code), None) => code.clone(),
            (None, Some(desc)) => desc.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Yahoo Finance market data provider.
pub struct YahooFinanceProvider {
    config: YahooConfig,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(config: YahooConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (compatible; zero-scanner)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { config, client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        symbol: &str,
    ) -> Result<T, ProviderError> {
        debug!(url = %url, symbol = symbol, "Fetching from Yahoo Finance");

        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network("Request timeout".into())
                } else if e.is_connect() {
                    ProviderError::Network("Connection failed".into())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::DataNotAvailable(format!(
                "{} not found",
                symbol
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Internal(format!(
                "HTTP {}: {}",
                status,
                truncate_with_ellipsis(&body, 200)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("Failed to parse response: {}", e)))
    }
}

/// Zip the chart's parallel arrays into candles, skipping sessions with a
/// `null` in any field.
fn parse_chart(result: ChartResult) -> Vec<Candle> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let field = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let timestamp = Utc.timestamp_opt(ts, 0).single()?;
            Some(Candle {
                timestamp,
                open: field(&quote.open, i)?,
                high: field(&quote.high, i)?,
                low: field(&quote.low, i)?,
                close: field(&quote.close, i)?,
                volume: field(&quote.volume, i)?,
            })
        })
        .collect()
}

/// Flatten quote summary modules into one object. The first module to
/// define a field wins.
fn flatten_modules(modules: Map<String, Value>) -> Value {
    let mut flat = Map::new();
    for (_, module) in modules {
        if let Value::Object(fields) = module {
            for (key, value) in fields {
                flat.entry(key).or_insert(value);
            }
        }
    }
    Value::Object(flat)
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_price_history(&self, symbol: &str) -> Result<Vec<Candle>, ProviderError> {
        let url = format!(
            "{}{}/{}?range={}&interval=1d",
            self.config.base_url, CHART_ENDPOINT, symbol, self.config.range
        );

        let envelope: ChartEnvelope = self.get_json(&url, symbol).await?;

        if let Some(err) = envelope.chart.error {
            return Err(ProviderError::DataNotAvailable(err.message()));
        }

        let result = envelope
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("no chart for {}", symbol)))?;

        Ok(parse_chart(result))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Value, ProviderError> {
        let url = format!(
            "{}{}/{}?modules={}",
            self.config.base_url, QUOTE_SUMMARY_ENDPOINT, symbol, SUMMARY_MODULES
        );

        let envelope: SummaryEnvelope = self.get_json(&url, symbol).await?;

        if let Some(err) = envelope.quote_summary.error {
            return Err(ProviderError::DataNotAvailable(err.message()));
        }

        let modules = envelope
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| {
                ProviderError::DataNotAvailable(format!("no quote summary for {}", symbol))
            })?;

        Ok(flatten_modules(modules))
    }
}
