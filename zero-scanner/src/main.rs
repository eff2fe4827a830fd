//! Zero Scanner - one screening pass over the configured universe.
//!
//! Scheduled runs are gated on market hours. Pass `--manual` (or run from a
//! manually dispatched workflow) to scan regardless.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zero_common::config::{config_dir, expand_path, Config};
use zero_common::logging::{generate_run_id, init_logging_with_exclusions};
use zero_common::Validate;
use zero_scanner::market_hours::EVENT_NAME_VAR;
use zero_scanner::{
    is_manual_run, CsvTableSink, JsonFileStateStore, MarketHours, ScanPipeline, ScannerConfig,
    TelegramChannel, YahooFinanceProvider,
};

/// Equity screener with deduplicated alerts.
#[derive(Parser, Debug)]
#[command(name = "zero-scanner")]
#[command(author = "theonlyhennygod")]
#[command(version = "0.1.0")]
#[command(about = "Technical + fundamental equity screener", long_about = None)]
struct Cli {
    /// Run even when the market is closed
    #[arg(long)]
    manual: bool,

    /// Universe file (overrides config)
    #[arg(long)]
    universe: Option<String>,

    /// Configuration directory
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Evaluate and report without writing tables, sending alerts or saving state
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dir = cli.config_dir.clone().unwrap_or_else(config_dir);

    let shared = Config::load_with_env(&dir)?;
    init_logging_with_exclusions(
        &shared.observability.log_level,
        &shared.observability.log_format,
        &shared.observability.excluded_targets,
    );
    shared.validate().context("Invalid shared configuration")?;

    let mut config = ScannerConfig::load_with_env(&dir).context("Failed to load scanner config")?;
    if let Some(universe) = cli.universe {
        config.universe.path = universe;
    }
    config.validate().context("Invalid scanner configuration")?;

    let run_id = generate_run_id();
    info!(run_id = %run_id, "Zero Scanner v{}", env!("CARGO_PKG_VERSION"));

    let event_name = std::env::var(EVENT_NAME_VAR).ok();
    let manual = is_manual_run(cli.manual, event_name.as_deref());
    if config.market_hours.enabled && !manual {
        if let Err(closed) = MarketHours::from_config(&config.market_hours).check(Utc::now()) {
            info!(run_id = %run_id, "{}, skipping scan", closed);
            return Ok(());
        }
    }

    let provider = Arc::new(YahooFinanceProvider::new(config.provider.clone()));
    let sink = Arc::new(CsvTableSink::new(expand_path(&config.output.results_dir)));
    let channel = Arc::new(TelegramChannel::from_config(&shared, &config.output));
    let store = Arc::new(JsonFileStateStore::new(config.state_file()));

    let pipeline = ScanPipeline::new(config, provider, channel, store)
        .with_sink(sink)
        .dry_run(cli.dry_run);

    let outcome = pipeline.run(Utc::now()).await?;
    info!(
        run_id = %run_id,
        new_alerts = outcome.delta.total(),
        "{}",
        outcome.result.summary()
    );

    Ok(())
}
