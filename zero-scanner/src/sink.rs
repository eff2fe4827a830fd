//! Result tables and the sinks they are appended to.
//!
//! Every batch carries its own header row: `Timestamp`, `symbol`, then each
//! record column that is present in at least one row of the batch, in the
//! canonical column order. Absent cells are empty strings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::debug;

use crate::record::{SymbolRecord, COLUMNS};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Table
// ============================================================================

/// A batch of rows ready to append to a named table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a batch from records, stamping every row with `timestamp`.
    pub fn from_records(records: &[SymbolRecord], timestamp: DateTime<Utc>) -> Self {
        let values: Vec<_> = records.iter().map(SymbolRecord::values).collect();

        let present: Vec<usize> = (0..COLUMNS.len())
            .filter(|&i| values.iter().any(|row| row[i].is_some()))
            .collect();

        let mut header = vec!["Timestamp".to_string(), "symbol".to_string()];
        header.extend(present.iter().map(|&i| COLUMNS[i].to_string()));

        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let rows = records
            .iter()
            .zip(&values)
            .map(|(record, row)| {
                let mut cells = vec![stamp.clone(), record.symbol.clone()];
                cells.extend(
                    present
                        .iter()
                        .map(|&i| row[i].map(|v| v.to_string()).unwrap_or_default()),
                );
                cells
            })
            .collect();

        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

// ============================================================================
// Result Sink
// ============================================================================

/// Destination for result tables.
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Where written tables can be found, for linking from alerts.
    fn location(&self) -> Option<String> {
        None
    }

    /// Append a batch (header row included) to the named table.
    async fn append(&self, table: &str, batch: &Table) -> Result<()>;
}

/// Appends each table to `<dir>/<table>.csv`.
pub struct CsvTableSink {
    dir: PathBuf,
}

impl CsvTableSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", table))
    }
}

#[async_trait]
impl ResultSink for CsvTableSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn location(&self) -> Option<String> {
        Some(self.dir.display().to_string())
    }

    async fn append(&self, table: &str, batch: &Table) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.table_path(table);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        // Rows are as wide as the header; the batch header varies between batches
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        writer.write_record(&batch.header)?;
        for row in &batch.rows {
            writer.write_record(row)?;
        }
        writer.flush().context("Failed to flush CSV writer")?;

        debug!(table = table, rows = batch.len(), path = %path.display(), "Appended table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fundamentals::FundamentalSnapshot;
    use crate::indicators::TechnicalSnapshot;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 10, 15, 0).unwrap()
    }

    fn records() -> Vec<SymbolRecord> {
        vec![
            SymbolRecord::new(
                "AAA",
                FundamentalSnapshot {
                    market_cap: Some(5e10),
                    ..Default::default()
                },
                TechnicalSnapshot {
                    latest_close: Some(110.5),
                    ..Default::default()
                },
            ),
            SymbolRecord::new(
                "BBB",
                FundamentalSnapshot::default(),
                TechnicalSnapshot {
                    rsi14: Some(65.0),
                    ..Default::default()
                },
            ),
        ]
    }

    #[test]
    fn test_table_schema_only_present_columns() {
        let table = Table::from_records(&records(), stamp());
        assert_eq!(
            table.header,
            vec!["Timestamp", "symbol", "marketCap", "latest_close", "rsi14"]
        );
        assert_eq!(
            table.rows[0],
            vec!["2024-01-05 10:15:00", "AAA", "50000000000", "110.5", ""]
        );
        assert_eq!(table.rows[1], vec!["2024-01-05 10:15:00", "BBB", "", "", "65"]);
    }

    #[test]
    fn test_empty_table() {
        let table = Table::from_records(&[], stamp());
        assert!(table.is_empty());
        assert_eq!(table.header, vec!["Timestamp", "symbol"]);
    }

    #[test]
    fn test_csv_sink_location_is_results_dir() {
        let sink = CsvTableSink::new("/srv/scanner/results");
        assert_eq!(sink.location().as_deref(), Some("/srv/scanner/results"));
    }

    #[tokio::test]
    async fn test_csv_sink_appends_batches() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvTableSink::new(dir.path().join("results"));
        let table = Table::from_records(&records()[..1], stamp());

        sink.append("Trending", &table).await.unwrap();
        sink.append("Trending", &table).await.unwrap();

        let content = std::fs::read_to_string(sink.table_path("Trending")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Timestamp,symbol,marketCap,latest_close");
        assert_eq!(lines[1], "2024-01-05 10:15:00,AAA,50000000000,110.5");
        assert_eq!(lines[2], lines[0]);
    }
}
