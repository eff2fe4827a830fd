//! Technical indicator engine.
//!
//! Pure functions turning a daily [`PriceSeries`] into scalar indicators.
//! Nothing here fails: a series too short for an indicator yields `None`
//! for that indicator, and averages use whatever history is available
//! (minimum periods = 1).
//!
//! # Conventions
//! - EWMA is seeded by the first observation and carries no bias
//!   adjustment: `y[0] = x[0]`, `y[t] = (1 - α)·y[t-1] + α·x[t]`.
//! - Span form uses `α = 2 / (span + 1)`; center-of-mass form uses
//!   `α = 1 / (1 + com)`.

use serde::{Deserialize, Serialize};

use crate::data::PriceSeries;

// ============================================================================
// Constants
// ============================================================================

/// Short simple moving average window
pub const SMA_SHORT: usize = 50;
/// Long simple moving average window
pub const SMA_LONG: usize = 200;
/// Momentum oscillator period
pub const RSI_PERIOD: usize = 14;
/// MACD fast span
pub const MACD_FAST: usize = 12;
/// MACD slow span
pub const MACD_SLOW: usize = 26;
/// MACD signal span
pub const MACD_SIGNAL: usize = 9;
/// One trading week
pub const VOLUME_WEEK: usize = 5;
/// One trading month
pub const VOLUME_MONTH: usize = 20;
/// One trading year
pub const YEAR_SESSIONS: usize = 252;

// ============================================================================
// Primitive Calculations
// ============================================================================

/// Mean of the trailing `window` values, or of all values when fewer exist.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let start = values.len().saturating_sub(window);
    mean(&values[start..])
}

/// Smoothing factor for a span-parameterized EWMA.
pub fn span_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Smoothing factor for a center-of-mass-parameterized EWMA.
pub fn com_alpha(com: f64) -> f64 {
    1.0 / (1.0 + com)
}

/// Exponentially weighted moving average, seeded by the first value.
pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let y = match prev {
            None => x,
            Some(p) => (1.0 - alpha) * p + alpha * x,
        };
        out.push(y);
        prev = Some(y);
    }
    out
}

/// Relative strength index over session-to-session close deltas.
///
/// Gains and losses are smoothed with `α = 1 / period`. Returns `None` with
/// fewer than two closes or when the series never moves.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if closes.len() < 2 || period == 0 {
        return None;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let ups: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let downs: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let alpha = com_alpha(period as f64 - 1.0);
    let avg_up = *ewm(&ups, alpha).last()?;
    let avg_down = *ewm(&downs, alpha).last()?;

    if avg_down == 0.0 {
        // No losses at all: saturated if there were gains, undefined otherwise
        return if avg_up > 0.0 { Some(100.0) } else { None };
    }

    let rs = avg_up / avg_down;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD main and signal line at the latest session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
}

/// MACD (12, 26, 9) at the latest session.
pub fn macd(closes: &[f64]) -> Option<Macd> {
    if closes.is_empty() {
        return None;
    }

    let fast = ewm(closes, span_alpha(MACD_FAST));
    let slow = ewm(closes, span_alpha(MACD_SLOW));
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ewm(&line, span_alpha(MACD_SIGNAL));

    Some(Macd {
        line: *line.last()?,
        signal: *signal.last()?,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn trailing_min(values: &[f64], window: usize) -> Option<f64> {
    let start = values.len().saturating_sub(window);
    values[start..].iter().copied().reduce(f64::min)
}

// ============================================================================
// Technical Snapshot
// ============================================================================

/// Technical indicators for one symbol at the latest session.
///
/// Every field is optional; serialized names match the result table
/// columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub latest_close: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub volume: Option<f64>,
    pub avgvol1w: Option<f64>,
    pub avgvol20: Option<f64>,
    #[serde(rename = "52w_low")]
    pub low_52w: Option<f64>,
    #[serde(rename = "1d_close")]
    pub prior_close: Option<f64>,
    #[serde(rename = "1d_high")]
    pub prior_high: Option<f64>,
}

impl TechnicalSnapshot {
    /// Compute every indicator from a series. An empty series gives an
    /// all-absent snapshot.
    pub fn from_series(series: &PriceSeries) -> Self {
        if series.is_empty() {
            return Self::default();
        }

        let closes = series.closes();
        let volumes = series.volumes();
        let macd = macd(&closes);

        Self {
            latest_close: series.latest().map(|b| b.close),
            sma50: sma(&closes, SMA_SHORT),
            sma200: sma(&closes, SMA_LONG),
            rsi14: rsi(&closes, RSI_PERIOD),
            macd: macd.map(|m| m.line),
            macd_signal: macd.map(|m| m.signal),
            volume: series.latest().map(|b| b.volume),
            avgvol1w: sma(&volumes, VOLUME_WEEK),
            avgvol20: sma(&volumes, VOLUME_MONTH),
            low_52w: trailing_min(&closes, YEAR_SESSIONS),
            prior_close: series.prior().map(|b| b.close),
            prior_high: series.prior().map(|b| b.high),
        }
    }

    /// True when no indicator could be computed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
