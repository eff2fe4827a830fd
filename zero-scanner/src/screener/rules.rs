//! Screen predicates.
//!
//! Each screen is a pure, total predicate over a [`SymbolRecord`]. `check`
//! walks the conditions in order and reports the first one that fails,
//! either because a required field is absent or because the condition is
//! false. Absent optional fields are an explicit branch, never an error.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::ThresholdConfig;
use crate::record::SymbolRecord;

/// Guards relative-distance denominators.
const EPSILON: f64 = 1e-9;

// Trending
const TRENDING_RSI_MIN: f64 = 50.0;
const TRENDING_RSI_MAX: f64 = 80.0;
const TRENDING_VOLUME_MULTIPLE: f64 = 1.5;

// Retest200
const RETEST_PRIOR_CLOSE_BAND: f64 = 0.05;
const RETEST_PRIOR_HIGH_BAND: f64 = 0.02;
const RETEST_VOLUME_MULTIPLE: f64 = 1.2;
const RETEST_RSI_MIN: f64 = 50.0;

// ============================================================================
// Screen Kind
// ============================================================================

/// The named screening lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScreenKind {
    FundamentalStrong,
    Trending,
    Retest200,
}

impl ScreenKind {
    /// Screens whose new members are alerted.
    pub const ALERTING: [ScreenKind; 2] = [ScreenKind::Trending, ScreenKind::Retest200];

    /// Result table name.
    pub fn table(&self) -> &'static str {
        match self {
            Self::FundamentalStrong => "Fundamental_Strong",
            Self::Trending => "Trending",
            Self::Retest200 => "Retest200",
        }
    }

    /// Key in the persisted alert state.
    pub fn state_key(&self) -> &'static str {
        match self {
            Self::FundamentalStrong => "fundamental_strong",
            Self::Trending => "trending",
            Self::Retest200 => "retest200",
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

// ============================================================================
// Rejection
// ============================================================================

/// Why a record did not pass a screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// A field the screen needs is absent
    Missing(&'static str),
    /// All inputs present but the condition is false
    Failed(&'static str),
}

impl Rejection {
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "missing {}", field),
            Self::Failed(condition) => write!(f, "failed {}", condition),
        }
    }
}

fn require(value: Option<f64>, field: &'static str) -> Result<f64, Rejection> {
    value.ok_or(Rejection::Missing(field))
}

fn ensure(condition: bool, name: &'static str) -> Result<(), Rejection> {
    if condition {
        Ok(())
    } else {
        Err(Rejection::Failed(name))
    }
}

fn relative_distance(value: f64, reference: f64) -> f64 {
    (value - reference).abs() / reference.max(EPSILON)
}

// ============================================================================
// Screen Trait
// ============================================================================

/// A named boolean predicate over a merged symbol record.
pub trait Screen: Send + Sync {
    fn kind(&self) -> ScreenKind;

    fn check(&self, record: &SymbolRecord) -> Result<(), Rejection>;

    fn passes(&self, record: &SymbolRecord) -> bool {
        self.check(record).is_ok()
    }
}

// ============================================================================
// Fundamental Strength
// ============================================================================

/// Gating screen on size and valuation.
///
/// Market cap is mandatory. PEG, price-to-sales and EV/EBITDA are only
/// checked when present.
#[derive(Debug, Clone)]
pub struct FundamentalStrength {
    thresholds: ThresholdConfig,
}

impl FundamentalStrength {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }
}

impl Screen for FundamentalStrength {
    fn kind(&self) -> ScreenKind {
        ScreenKind::FundamentalStrong
    }

    fn check(&self, record: &SymbolRecord) -> Result<(), Rejection> {
        let f = &record.fundamentals;
        let t = &self.thresholds;

        let market_cap = require(f.market_cap, "marketCap")?;
        ensure(
            market_cap / t.market_cap_unit >= t.min_market_cap,
            "marketCap >= minimum",
        )?;

        if let Some(peg) = f.peg {
            ensure(peg < t.max_peg, "peg < maximum")?;
        }
        if let Some(ps) = f.price_to_sales {
            ensure(ps <= t.max_price_to_sales, "priceToSales <= maximum")?;
        }
        if let Some(ev) = f.ev_to_ebitda {
            ensure(ev <= t.max_ev_to_ebitda, "evToEbitda <= maximum")?;
        }
        Ok(())
    }
}

// ============================================================================
// Trending
// ============================================================================

/// Established uptrend with momentum and a volume surge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trending;

impl Screen for Trending {
    fn kind(&self) -> ScreenKind {
        ScreenKind::Trending
    }

    fn check(&self, record: &SymbolRecord) -> Result<(), Rejection> {
        let t = &record.technicals;

        let close = require(t.latest_close, "latest_close")?;
        let sma50 = require(t.sma50, "sma50")?;
        let sma200 = require(t.sma200, "sma200")?;
        ensure(close > sma50 && close > sma200, "close above sma50 and sma200")?;
        ensure(sma50 > sma200, "sma50 > sma200")?;

        let rsi = require(t.rsi14, "rsi14")?;
        ensure(
            rsi > TRENDING_RSI_MIN && rsi < TRENDING_RSI_MAX,
            "50 < rsi14 < 80",
        )?;

        let low = require(t.low_52w, "52w_low")?;
        ensure(close > low, "close > 52w_low")?;

        let volume = require(t.volume, "volume")?;
        let avg_week = require(t.avgvol1w, "avgvol1w")?;
        ensure(
            volume > TRENDING_VOLUME_MULTIPLE * avg_week,
            "volume > 1.5 x avgvol1w",
        )
    }
}

// ============================================================================
// Retest200
// ============================================================================

/// Pullback to the 200-session average followed by a bounce toward the
/// prior session's high.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retest200;

impl Screen for Retest200 {
    fn kind(&self) -> ScreenKind {
        ScreenKind::Retest200
    }

    fn check(&self, record: &SymbolRecord) -> Result<(), Rejection> {
        let t = &record.technicals;

        let close = require(t.latest_close, "latest_close")?;
        let sma200 = require(t.sma200, "sma200")?;
        let prior_close = require(t.prior_close, "1d_close")?;
        let prior_high = require(t.prior_high, "1d_high")?;
        let volume = require(t.volume, "volume")?;

        ensure(close > sma200, "close > sma200")?;
        ensure(
            relative_distance(prior_close, sma200) <= RETEST_PRIOR_CLOSE_BAND,
            "1d_close within 5% of sma200",
        )?;
        ensure(
            relative_distance(close, prior_high) <= RETEST_PRIOR_HIGH_BAND,
            "close within 2% of 1d_high",
        )?;

        // Both averages absent fails rather than comparing against zero
        let baseline = require(t.avgvol20.or(t.avgvol1w), "avgvol20")?;
        ensure(
            volume > RETEST_VOLUME_MULTIPLE * baseline,
            "volume > 1.2 x average",
        )?;

        let rsi = require(t.rsi14, "rsi14")?;
        ensure(rsi > RETEST_RSI_MIN, "rsi14 > 50")?;

        let macd = require(t.macd, "macd")?;
        let signal = require(t.macd_signal, "macd_signal")?;
        ensure(macd > signal, "macd > macd_signal")
    }
}
