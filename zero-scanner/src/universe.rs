//! Universe loading and the bad-symbol ledger.
//!
//! The universe is a text file with one symbol per line. Symbols whose data
//! recently failed to load are recorded in the ledger and skipped until their
//! retry window has elapsed.
//!
//! # Ledger Format
//!
//! One `SYMBOL|YYYY-MM-DD` line per failure, appended. A line without a
//! parsable date counts as marked at load time, so the symbol sits out a
//! full window.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ScanError;

const LEDGER_DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Bad-Symbol Ledger
// ============================================================================

/// Temporarily excluded symbols, keyed to the instant they become eligible
/// again.
#[derive(Debug, Clone)]
pub struct BadSymbolLedger {
    path: PathBuf,
    retry_window: Duration,
    expiries: HashMap<String, DateTime<Utc>>,
}

impl BadSymbolLedger {
    /// A ledger with no entries that appends to `path`.
    pub fn empty(path: impl Into<PathBuf>, retry_window: Duration) -> Self {
        Self {
            path: path.into(),
            retry_window,
            expiries: HashMap::new(),
        }
    }

    /// Load the ledger file. A missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>, retry_window: Duration, now: DateTime<Utc>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read ledger {}", path.display()))
            }
        };

        let mut ledger = Self::empty(path, retry_window);
        for line in content.lines() {
            ledger.ingest_line(line, now);
        }
        Ok(ledger)
    }

    fn ingest_line(&mut self, line: &str, now: DateTime<Utc>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let (symbol, marked_at) = match line.split_once('|') {
            Some((symbol, date)) => {
                let marked_at = NaiveDate::parse_from_str(date.trim(), LEDGER_DATE_FORMAT)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
                    .unwrap_or(now);
                (symbol.trim(), marked_at)
            }
            None => (line, now),
        };
        if symbol.is_empty() {
            return;
        }

        let expiry = marked_at + self.retry_window;
        self.expiries
            .entry(symbol.to_string())
            .and_modify(|e| *e = (*e).max(expiry))
            .or_insert(expiry);
    }

    /// Whether the symbol is still inside its retry window.
    pub fn is_excluded(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        self.expiries.get(symbol).is_some_and(|expiry| now < *expiry)
    }

    /// When the symbol becomes eligible again, if it is in the ledger.
    pub fn expiry(&self, symbol: &str) -> Option<DateTime<Utc>> {
        self.expiries.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Record a failure: append a dated line and exclude the symbol for a
    /// full window.
    pub fn mark(&mut self, symbol: &str, reason: &str, now: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;
        writeln!(file, "{}|{}", symbol, now.format(LEDGER_DATE_FORMAT))
            .context("Failed to append to ledger")?;

        // Same day granularity as the file, so a reload agrees with memory
        let marked_at = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        self.expiries
            .insert(symbol.to_string(), marked_at + self.retry_window);

        info!(symbol = symbol, reason = reason, "Marked bad symbol");
        Ok(())
    }
}

// ============================================================================
// Universe
// ============================================================================

/// Parse universe file content: trimmed, non-empty, first occurrence wins.
pub fn parse_symbols(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Read the universe file.
pub fn load_symbols(path: &Path) -> Result<Vec<String>, ScanError> {
    let content = fs::read_to_string(path)
        .map_err(|e| ScanError::Universe(format!("{}: {}", path.display(), e)))?;
    Ok(parse_symbols(&content))
}

/// Drop symbols the ledger currently excludes.
///
/// If that would leave nothing, the unfiltered list is returned instead.
pub fn apply_ledger(symbols: Vec<String>, ledger: &BadSymbolLedger, now: DateTime<Utc>) -> Vec<String> {
    let filtered: Vec<String> = symbols
        .iter()
        .filter(|s| !ledger.is_excluded(s, now))
        .cloned()
        .collect();
    let skipped = symbols.len() - filtered.len();

    if filtered.is_empty() && !symbols.is_empty() {
        warn!(
            skipped,
            "Every symbol is in the bad-symbol ledger, scanning the full universe"
        );
        return symbols;
    }

    info!(loaded = filtered.len(), skipped, "Loaded universe");
    filtered
}

/// Load the universe and filter it through the ledger.
pub fn load_universe(path: &Path, ledger: &BadSymbolLedger, now: DateTime<Utc>) -> Result<Vec<String>, ScanError> {
    let symbols = load_symbols(path)?;
    Ok(apply_ledger(symbols, ledger, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn ledger_with(content: &str, now: DateTime<Utc>) -> (tempfile::TempDir, BadSymbolLedger) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_symbols.txt");
        fs::write(&path, content).unwrap();
        let ledger = BadSymbolLedger::load(&path, Duration::days(7), now).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_parse_symbols_dedup_preserves_order() {
        let symbols = parse_symbols("TCS.NS\n\n  INFY.NS \nTCS.NS\nHDFCBANK.NS\n");
        assert_eq!(symbols, vec!["TCS.NS", "INFY.NS", "HDFCBANK.NS"]);
    }

    #[test]
    fn test_missing_universe_is_error() {
        let err = load_symbols(Path::new("/nonexistent/universe.csv")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_ledger_window() {
        let now = at(2024, 3, 10);
        let (_dir, ledger) = ledger_with("AAA|2024-03-05\nBBB|2024-03-01\n", now);

        assert!(ledger.is_excluded("AAA", now));
        // Marked nine days ago: eligible again
        assert!(!ledger.is_excluded("BBB", now));
        assert!(!ledger.is_excluded("CCC", now));
    }

    #[test]
    fn test_ledger_unparsable_date_is_now() {
        let now = at(2024, 3, 10);
        let (_dir, ledger) = ledger_with("AAA|yesterday\nBBB\n", now);

        assert_eq!(ledger.expiry("AAA"), Some(now + Duration::days(7)));
        assert_eq!(ledger.expiry("BBB"), Some(now + Duration::days(7)));
        assert!(ledger.is_excluded("AAA", now + Duration::days(6)));
        assert!(!ledger.is_excluded("AAA", now + Duration::days(7)));
    }

    #[test]
    fn test_ledger_latest_mark_wins() {
        let now = at(2024, 3, 10);
        let (_dir, ledger) = ledger_with("AAA|2024-03-09\nAAA|2024-01-01\n", now);
        assert!(ledger.is_excluded("AAA", now));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger =
            BadSymbolLedger::load(dir.path().join("none.txt"), Duration::days(7), Utc::now()).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_mark_appends_and_excludes() {
        let now = at(2024, 3, 10);
        let (dir, mut ledger) = ledger_with("AAA|2024-01-01\n", now);

        ledger.mark("ZZZ.NS", "no price data", now).unwrap();
        assert!(ledger.is_excluded("ZZZ.NS", now));

        let content = fs::read_to_string(dir.path().join("bad_symbols.txt")).unwrap();
        assert_eq!(content, "AAA|2024-01-01\nZZZ.NS|2024-03-10\n");

        let reloaded =
            BadSymbolLedger::load(dir.path().join("bad_symbols.txt"), Duration::days(7), now).unwrap();
        assert_eq!(reloaded.expiry("ZZZ.NS"), ledger.expiry("ZZZ.NS"));
    }

    #[test]
    fn test_apply_ledger_filters_and_falls_back() {
        let now = at(2024, 3, 10);
        let (_dir, ledger) = ledger_with("AAA|2024-03-09\n", now);

        let filtered = apply_ledger(vec!["AAA".into(), "BBB".into()], &ledger, now);
        assert_eq!(filtered, vec!["BBB"]);

        let fallback = apply_ledger(vec!["AAA".into()], &ledger, now);
        assert_eq!(fallback, vec!["AAA"]);
    }

    #[test]
    fn test_load_universe() {
        let now = at(2024, 3, 10);
        let (dir, ledger) = ledger_with("INFY.NS|2024-03-09\n", now);
        let path = dir.path().join("universe.csv");
        fs::write(&path, "TCS.NS\nINFY.NS\nTCS.NS\n").unwrap();

        let universe = load_universe(&path, &ledger, now).unwrap();
        assert_eq!(universe, vec!["TCS.NS"]);
    }
}
