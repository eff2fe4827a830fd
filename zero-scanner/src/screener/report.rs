//! Local report generation for scan results.
//!
//! Generates reports in two formats:
//! - Markdown (human-readable summary of each screening list)
//! - JSON (the full scan result)

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::engine::ScanResult;
use super::rules::ScreenKind;
use crate::record::SymbolRecord;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    /// Markdown format (human-readable)
    Markdown,
    /// JSON format (machine-readable)
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Scan Report
// ============================================================================

/// Report generator for a scan result.
pub struct ScanReport<'a> {
    result: &'a ScanResult,
}

impl<'a> ScanReport<'a> {
    pub fn new(result: &'a ScanResult) -> Self {
        Self { result }
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Save the report as `<dir>/<scan id>.<ext>`.
    pub fn save_to_dir(&self, dir: &Path, format: ReportFormat) -> Result<PathBuf> {
        let file_path = dir.join(format!("{}.{}", self.result.id, format.extension()));

        std::fs::create_dir_all(dir).context("Failed to create report directory")?;
        std::fs::write(&file_path, self.generate(format))
            .with_context(|| format!("Failed to write report file {}", file_path.display()))?;

        Ok(file_path)
    }

    /// Generate markdown report.
    pub fn to_markdown(&self) -> String {
        let r = self.result;
        let mut md = String::new();

        let _ = write!(
            md,
            "# Scan Report\n\n**Scan ID**: {}\n**Completed**: {}\n**Duration**: {:.1}s\n\n",
            r.id,
            r.completed_at.format("%Y-%m-%d %H:%M:%S"),
            r.duration_secs
        );

        md.push_str("## Summary\n\n");
        let _ = writeln!(md, "- **Scanned**: {} symbols", r.total_scanned);
        let _ = writeln!(md, "- **Unavailable**: {} symbols\n", r.unavailable.len());

        md.push_str("| Screen | Input | Passed | Pass rate |\n");
        md.push_str("|--------|-------|--------|-----------|\n");
        for fr in &r.filter_results {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {:.1}% |",
                fr.screen, fr.input, fr.passed, fr.pass_rate
            );
        }
        md.push('\n');

        for screen in [ScreenKind::Trending, ScreenKind::Retest200, ScreenKind::FundamentalStrong] {
            let members = r.members(screen);
            let _ = writeln!(md, "## {} ({})\n", screen, members.len());
            if members.is_empty() {
                md.push_str("_None_\n\n");
                continue;
            }
            md.push_str("| Symbol | Close | SMA50 | SMA200 | RSI14 | Volume | Mcap (cr) |\n");
            md.push_str("|--------|-------|-------|--------|-------|--------|-----------|\n");
            for record in members {
                md.push_str(&markdown_row(record));
            }
            md.push('\n');
        }

        if !r.unavailable.is_empty() {
            md.push_str("## Unavailable\n\n");
            for u in &r.unavailable {
                let _ = writeln!(md, "- `{}`: {}", u.symbol, u.reason);
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        let _ = writeln!(md, "*Generated at {} UTC*", Utc::now().format("%Y-%m-%d %H:%M:%S"));

        md
    }

    /// Generate JSON report.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self.result).unwrap_or_else(|_| "{}".to_string())
    }
}

fn cell(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.*}", precision, v))
}

fn markdown_row(record: &SymbolRecord) -> String {
    let t = &record.technicals;
    format!(
        "| {} | {} | {} | {} | {} | {} | {} |\n",
        record.symbol,
        cell(t.latest_close, 2),
        cell(t.sma50, 2),
        cell(t.sma200, 2),
        cell(t.rsi14, 1),
        cell(t.volume, 0),
        cell(record.fundamentals.market_cap.map(|m| m / 1e7), 0),
    )
}

// ============================================================================
// Tests
// ============================================================================
