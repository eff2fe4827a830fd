//! One evaluation pass, end to end.
//!
//! ```text
//! universe ─▶ evaluator ─▶ result tables ─▶ sinks
//!                 │
//!                 ├─▶ ledger marks (unavailable symbols)
//!                 └─▶ alert tracker ─▶ channel ─▶ state store
//!                                          └─▶ local reports
//! ```
//!
//! Only an unreadable universe aborts the pass. Sink, channel, store and
//! report failures are logged and the pass carries on.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use zero_common::config::expand_path;

use crate::alert_state::{AlertDelta, AlertState, AlertStateStore, AlertTracker};
use crate::data::MarketDataProvider;
use crate::error::ScanError;
use crate::notification::{format_alert_message, AlertChannel};
use crate::screener::{ReportFormat, ScanReport, ScanResult, ScannerConfig, UniverseEvaluator};
use crate::sink::{ResultSink, Table};
use crate::universe::{load_universe, BadSymbolLedger};

/// What a pass did.
#[derive(Debug)]
pub struct PassOutcome {
    pub result: ScanResult,
    pub delta: AlertDelta,
    /// Alert text, when anything was new
    pub message: Option<String>,
    pub alert_sent: bool,
    pub state_saved: bool,
    pub reports: Vec<PathBuf>,
}

/// Wires the evaluator to its collaborators.
pub struct ScanPipeline {
    config: ScannerConfig,
    provider: Arc<dyn MarketDataProvider>,
    sinks: Vec<Arc<dyn ResultSink>>,
    channel: Arc<dyn AlertChannel>,
    store: Arc<dyn AlertStateStore>,
    dry_run: bool,
}

impl ScanPipeline {
    pub fn new(
        config: ScannerConfig,
        provider: Arc<dyn MarketDataProvider>,
        channel: Arc<dyn AlertChannel>,
        store: Arc<dyn AlertStateStore>,
    ) -> Self {
        Self {
            config,
            provider,
            sinks: Vec::new(),
            channel,
            store,
            dry_run: false,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Evaluate and report locally without touching sinks, the ledger, the
    /// channel or the alert state.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one pass as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<PassOutcome, ScanError> {
        let ledger_path = self.config.universe.ledger_file();
        let retry_window = self.config.universe.retry_window();
        let mut ledger = BadSymbolLedger::load(&ledger_path, retry_window, now).unwrap_or_else(|e| {
            warn!(error = %e, "Bad-symbol ledger unreadable, scanning without exclusions");
            BadSymbolLedger::empty(&ledger_path, retry_window)
        });

        let universe = load_universe(&self.config.universe.universe_file(), &ledger, now)?;
        if universe.is_empty() {
            warn!("Universe is empty");
        }

        let evaluator = UniverseEvaluator::new(Arc::clone(&self.provider), &self.config);
        let result = evaluator.evaluate(&universe).await;

        if !self.dry_run {
            for u in &result.unavailable {
                if let Err(e) = ledger.mark(&u.symbol, &u.reason, now) {
                    warn!(symbol = %u.symbol, error = %e, "Failed to mark bad symbol");
                }
            }
            self.write_tables(&result, now).await;
        }

        let (delta, message, alert_sent, state_saved) = self.reconcile_alerts(&result).await;
        let reports = self.save_reports(&result);

        info!(
            scan_id = %result.id,
            new_alerts = delta.total(),
            alert_sent,
            state_saved,
            "Scan pass complete"
        );

        Ok(PassOutcome {
            result,
            delta,
            message,
            alert_sent,
            state_saved,
            reports,
        })
    }

    async fn write_tables(&self, result: &ScanResult, now: DateTime<Utc>) {
        for (name, records) in result.tables() {
            if records.is_empty() {
                info!(table = name, "No data to write");
                continue;
            }

            let table = Table::from_records(records, now);
            for sink in &self.sinks {
                match sink.append(name, &table).await {
                    Ok(()) => info!(table = name, sink = sink.name(), rows = table.len(), "Wrote table"),
                    Err(e) => {
                        let err = ScanError::SinkWrite {
                            table: name.to_string(),
                            reason: format!("{:#}", e),
                        };
                        warn!(sink = sink.name(), "{}", err);
                    }
                }
            }
        }
    }

    async fn reconcile_alerts(&self, result: &ScanResult) -> (AlertDelta, Option<String>, bool, bool) {
        let prior = match self.store.load().await {
            Ok(state) => state,
            Err(e) => {
                warn!("{}", ScanError::StatePersistence(format!("{:#}", e)));
                AlertState::default()
            }
        };

        let (delta, state) = AlertTracker::new(prior).reconcile(|screen| result.symbols(screen));

        let results = self.sinks.iter().find_map(|sink| sink.location());
        let Some(message) = format_alert_message(&delta, results.as_deref()) else {
            info!("No new alerts");
            return (delta, None, false, false);
        };

        if self.dry_run {
            info!(new_alerts = delta.total(), "Dry run, alert not sent:\n{}", message);
            return (delta, Some(message), false, false);
        }

        let alert_sent = if !self.channel.is_configured() {
            warn!(channel = self.channel.name(), "Alert channel not configured");
            false
        } else {
            match self.channel.send(&message).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}", ScanError::AlertDelivery(format!("{:#}", e)));
                    false
                }
            }
        };

        // Persisted even when delivery failed, so a flaky channel cannot
        // cause the same symbols to be announced on every pass
        let state_saved = match self.store.save(&state).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", ScanError::StatePersistence(format!("{:#}", e)));
                false
            }
        };

        (delta, Some(message), alert_sent, state_saved)
    }

    fn save_reports(&self, result: &ScanResult) -> Vec<PathBuf> {
        let output = &self.config.output;
        if !output.local_report_enabled {
            return Vec::new();
        }

        let dir = expand_path(&output.report_dir);
        let report = ScanReport::new(result);
        let mut saved = Vec::new();

        for raw in &output.report_format {
            let format: ReportFormat = match raw.parse() {
                Ok(f) => f,
                Err(e) => {
                    warn!(format = %raw, error = %e, "Skipping report format");
                    continue;
                }
            };
            match report.save_to_dir(&dir, format) {
                Ok(path) => {
                    info!(path = %path.display(), format = %format, "Saved report");
                    saved.push(path);
                }
                Err(e) => warn!(format = %format, error = %format!("{:#}", e), "Failed to save report"),
            }
        }
        saved
    }
}
