//! Scanner error taxonomy.
//!
//! Only [`ScanError::Universe`] aborts a pass. Every other variant is logged
//! where it occurs and the pass continues.

use thiserror::Error;

use crate::screener::{Rejection, ScreenKind};

#[derive(Debug, Error)]
pub enum ScanError {
    /// Provider could not supply fundamentals or price history.
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// A screen rejected a record because a field was absent.
    #[error("{screen} rejected {symbol}: {rejection}")]
    ScreenEvaluation {
        symbol: String,
        screen: ScreenKind,
        rejection: Rejection,
    },

    #[error("Failed to write table {table}: {reason}")]
    SinkWrite { table: String, reason: String },

    #[error("Alert delivery failed: {0}")]
    AlertDelivery(String),

    #[error("Alert state persistence failed: {0}")]
    StatePersistence(String),

    #[error("Universe unavailable: {0}")]
    Universe(String),
}

impl ScanError {
    /// Whether the pass must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Universe(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_universe_is_fatal() {
        assert!(ScanError::Universe("missing file".into()).is_fatal());
        assert!(!ScanError::AlertDelivery("timeout".into()).is_fatal());
        assert!(!ScanError::DataUnavailable {
            symbol: "AAA".into(),
            reason: "empty".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_screen_evaluation_display() {
        let err = ScanError::ScreenEvaluation {
            symbol: "AAA".into(),
            screen: ScreenKind::Trending,
            rejection: Rejection::Missing("rsi14"),
        };
        assert_eq!(err.to_string(), "Trending rejected AAA: missing rsi14");
    }
}
