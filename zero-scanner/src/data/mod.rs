//! Market data module.
//!
//! Defines the daily price bar types consumed by the indicator engine and the
//! provider abstraction used to fetch them.
//!
//! # Data Sources
//! - **Yahoo Finance** (default): chart + quote summary endpoints, daily bars
//!   over a trailing one-year range

mod provider;
mod yahoo;

pub use provider::{MarketDataProvider, ProviderError};
pub use yahoo::{YahooConfig, YahooFinanceProvider};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// A single daily candlestick (OHLCV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Session timestamp
    pub timestamp: DateTime<Utc>,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

/// Chronologically ascending daily bars for one symbol.
///
/// No two bars share a timestamp. Construction sorts the input and keeps the
/// last bar seen for a duplicated timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Candle>,
}

impl PriceSeries {
    /// Build a series, normalizing order and duplicate timestamps.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<Candle>) -> Self {
        // Stable sort keeps provider order among equal timestamps, so the
        // retained bar is the one the provider delivered last.
        bars.sort_by_key(|b| b.timestamp);

        let mut deduped: Vec<Candle> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self {
            symbol: symbol.into(),
            bars: deduped,
        }
    }

    /// An empty series (provider returned nothing).
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Candle] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close column.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Volume column.
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Most recent bar.
    pub fn latest(&self) -> Option<&Candle> {
        self.bars.last()
    }

    /// The bar before the most recent one.
    pub fn prior(&self) -> Option<&Candle> {
        self.bars.len().checked_sub(2).map(|i| &self.bars[i])
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{Duration, TimeZone};

    /// Daily bars starting 2024-01-01, one per day, with high = close + 1.
    pub fn bars_from(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (&close, &volume))| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::bars_from;
    use super::*;

    #[test]
    fn test_series_sorts_and_dedups() {
        let mut bars = bars_from(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]);
        let mut dup = bars[1].clone();
        dup.close = 2.5;
        bars.reverse();
        bars.push(dup);

        let series = PriceSeries::new("AAA", bars);
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
        assert!(series
            .bars()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_latest_and_prior() {
        let series = PriceSeries::new("AAA", bars_from(&[5.0, 6.0], &[1.0, 2.0]));
        assert_eq!(series.latest().map(|b| b.close), Some(6.0));
        assert_eq!(series.prior().map(|b| b.close), Some(5.0));

        let single = PriceSeries::new("AAA", bars_from(&[5.0], &[1.0]));
        assert!(single.prior().is_none());
        assert!(PriceSeries::empty("AAA").latest().is_none());
    }
}
