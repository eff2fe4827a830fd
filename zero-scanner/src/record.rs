//! Merged per-symbol record consumed by the screens and the result sink.

use serde::{Deserialize, Serialize};

use crate::fundamentals::FundamentalSnapshot;
use crate::indicators::TechnicalSnapshot;

/// Result table columns in output order (after `Timestamp` and `symbol`).
pub const COLUMNS: &[&str] = &[
    "marketCap",
    "peg",
    "pe",
    "priceToSales",
    "evToEbitda",
    "latest_close",
    "sma50",
    "sma200",
    "rsi14",
    "macd",
    "macd_signal",
    "volume",
    "avgvol1w",
    "avgvol20",
    "52w_low",
    "1d_close",
    "1d_high",
];

/// Fundamental and technical snapshots for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub symbol: String,
    #[serde(flatten)]
    pub fundamentals: FundamentalSnapshot,
    #[serde(flatten)]
    pub technicals: TechnicalSnapshot,
}

impl SymbolRecord {
    pub fn new(
        symbol: impl Into<String>,
        fundamentals: FundamentalSnapshot,
        technicals: TechnicalSnapshot,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            fundamentals,
            technicals,
        }
    }

    /// Record with nothing known beyond the symbol.
    pub fn unavailable(symbol: impl Into<String>) -> Self {
        Self::new(symbol, FundamentalSnapshot::default(), TechnicalSnapshot::default())
    }

    /// Column values in [`COLUMNS`] order.
    pub fn values(&self) -> [Option<f64>; 17] {
        let f = &self.fundamentals;
        let t = &self.technicals;
        [
            f.market_cap,
            f.peg,
            f.pe,
            f.price_to_sales,
            f.ev_to_ebitda,
            t.latest_close,
            t.sma50,
            t.sma200,
            t.rsi14,
            t.macd,
            t.macd_signal,
            t.volume,
            t.avgvol1w,
            t.avgvol20,
            t.low_52w,
            t.prior_close,
            t.prior_high,
        ]
    }

    /// Value of a named column, if the column exists and is present.
    pub fn get(&self, column: &str) -> Option<f64> {
        let idx = COLUMNS.iter().position(|c| *c == column)?;
        self.values()[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_align_with_columns() {
        let record = SymbolRecord::new(
            "AAA",
            FundamentalSnapshot {
                market_cap: Some(1.0),
                ev_to_ebitda: Some(5.0),
                ..Default::default()
            },
            TechnicalSnapshot {
                latest_close: Some(6.0),
                low_52w: Some(15.0),
                prior_high: Some(17.0),
                ..Default::default()
            },
        );

        assert_eq!(record.values().len(), COLUMNS.len());
        assert_eq!(record.get("marketCap"), Some(1.0));
        assert_eq!(record.get("evToEbitda"), Some(5.0));
        assert_eq!(record.get("latest_close"), Some(6.0));
        assert_eq!(record.get("52w_low"), Some(15.0));
        assert_eq!(record.get("1d_high"), Some(17.0));
        assert_eq!(record.get("peg"), None);
        assert_eq!(record.get("bogus"), None);
    }

    #[test]
    fn test_serialized_field_names_match_columns() {
        let record = SymbolRecord::unavailable("AAA");
        let value = serde_json::to_value(&record).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["symbol"], "AAA");
        for column in COLUMNS {
            assert!(obj.contains_key(*column), "missing {}", column);
        }
    }
}
