//! Fundamental normalizer.
//!
//! Maps a provider's raw fundamental fields onto [`FundamentalSnapshot`].
//! Each canonical field has an ordered list of source aliases; the first
//! alias holding a finite number wins. Anything else leaves the field
//! absent, never zero.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Source aliases per canonical field, in lookup order.
const MARKET_CAP_KEYS: &[&str] = &["marketCap"];
const PEG_KEYS: &[&str] = &["pegRatio", "peg"];
const PE_KEYS: &[&str] = &["trailingPE", "forwardPE", "pe"];
const PRICE_TO_SALES_KEYS: &[&str] = &["priceToSalesTrailing12Months", "priceToSales"];
const EV_TO_EBITDA_KEYS: &[&str] = &["enterpriseToEbitda", "evToEbitda"];

/// Canonical fundamental metrics for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    pub peg: Option<f64>,
    pub pe: Option<f64>,
    #[serde(rename = "priceToSales")]
    pub price_to_sales: Option<f64>,
    #[serde(rename = "evToEbitda")]
    pub ev_to_ebitda: Option<f64>,
}

impl FundamentalSnapshot {
    /// Normalize a raw provider payload. Non-object input yields an
    /// all-absent snapshot.
    pub fn from_raw(raw: &Value) -> Self {
        let Value::Object(fields) = raw else {
            return Self::default();
        };
        let lookup = |keys: &[&str]| keys.iter().find_map(|k| fields.get(*k).and_then(as_number));

        Self {
            market_cap: lookup(MARKET_CAP_KEYS),
            peg: lookup(PEG_KEYS),
            pe: lookup(PE_KEYS),
            price_to_sales: lookup(PRICE_TO_SALES_KEYS),
            ev_to_ebitda: lookup(EV_TO_EBITDA_KEYS),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Coerce a JSON value to a finite number.
///
/// Accepts numbers, numeric strings and provider wrappers of the form
/// `{"raw": 1.2, "fmt": "1.20"}`.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("raw").and_then(as_number),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_fields() {
        let snap = FundamentalSnapshot::from_raw(&json!({
            "marketCap": 50_000_000_000.0_f64,
            "pegRatio": 0.8,
            "trailingPE": 22.5,
            "priceToSalesTrailing12Months": 5,
            "enterpriseToEbitda": 20
        }));
        assert_eq!(snap.market_cap, Some(5e10));
        assert_eq!(snap.peg, Some(0.8));
        assert_eq!(snap.pe, Some(22.5));
        assert_eq!(snap.price_to_sales, Some(5.0));
        assert_eq!(snap.ev_to_ebitda, Some(20.0));
    }

    #[test]
    fn test_aliases_and_fallbacks() {
        let snap = FundamentalSnapshot::from_raw(&json!({
            "peg": 1.4,
            "forwardPE": 18.0,
            "priceToSales": 3.0,
            "evToEbitda": 12.0
        }));
        assert_eq!(snap.peg, Some(1.4));
        assert_eq!(snap.pe, Some(18.0));
        assert_eq!(snap.price_to_sales, Some(3.0));
        assert_eq!(snap.ev_to_ebitda, Some(12.0));
        assert_eq!(snap.market_cap, None);
    }

    #[test]
    fn test_primary_alias_wins() {
        let snap = FundamentalSnapshot::from_raw(&json!({"pegRatio": 0.5, "peg": 2.0}));
        assert_eq!(snap.peg, Some(0.5));
    }

    #[test]
    fn test_malformed_primary_falls_through() {
        let snap = FundamentalSnapshot::from_raw(&json!({"pegRatio": "n/a", "peg": 0.9}));
        assert_eq!(snap.peg, Some(0.9));
    }

    #[test]
    fn test_raw_wrappers_and_strings() {
        let snap = FundamentalSnapshot::from_raw(&json!({
            "marketCap": {"raw": 1.2e12, "fmt": "1.2T"},
            "pegRatio": " 0.75 ",
            "enterpriseToEbitda": {}
        }));
        assert_eq!(snap.market_cap, Some(1.2e12));
        assert_eq!(snap.peg, Some(0.75));
        assert_eq!(snap.ev_to_ebitda, None);
    }

    #[test]
    fn test_absent_is_not_zero() {
        let snap = FundamentalSnapshot::from_raw(&json!({
            "marketCap": null,
            "pegRatio": true,
            "trailingPE": "Infinity"
        }));
        assert!(snap.is_empty());
        assert!(FundamentalSnapshot::from_raw(&Value::Null).is_empty());
        assert!(FundamentalSnapshot::from_raw(&json!([1, 2])).is_empty());
    }
}
