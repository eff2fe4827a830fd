//! Zero Scanner Library
//!
//! Scans a universe of equity symbols, derives technical indicators and
//! fundamental ratios for each, sorts them into screens and alerts on
//! symbols that newly qualify.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    zero-scanner (one pass per run)               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │  Market Data │──▶│  Screener    │──▶│  Sinks / Reports     │  │
//! │  │  Provider    │   │  Engine      │   └──────────────────────┘  │
//! │  └──────────────┘   └──────┬───────┘   ┌──────────────────────┐  │
//! │                            └──────────▶│  Alert Tracker       │  │
//! │                                        │  + Channel + State   │  │
//! │                                        └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Screens
//!
//! - **Fundamental_Strong**: market cap, PEG, P/S and EV/EBITDA thresholds
//! - **Trending**: price above both SMAs, SMA50 above SMA200, RSI between
//!   50 and 80, above the 52-week low, volume surge over the weekly average
//! - **Retest200**: prior close near SMA200, bounce toward the prior high,
//!   volume surge, RSI above 50, MACD above signal
//!
//! Only Trending and Retest200 alert. A symbol alerts once per screen for
//! the lifetime of the alert state.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod alert_state;
pub mod data;
pub mod error;
pub mod fundamentals;
pub mod indicators;
pub mod market_hours;
pub mod notification;
pub mod pipeline;
pub mod record;
pub mod screener;
pub mod sink;
pub mod universe;

pub use alert_state::{AlertDelta, AlertState, AlertStateStore, AlertTracker, JsonFileStateStore};
pub use data::{Candle, MarketDataProvider, PriceSeries, ProviderError, YahooConfig, YahooFinanceProvider};
pub use error::ScanError;
pub use fundamentals::FundamentalSnapshot;
pub use indicators::TechnicalSnapshot;
pub use market_hours::{is_manual_run, MarketClosed, MarketHours};
pub use notification::{format_alert_message, AlertChannel, TelegramChannel};
pub use pipeline::{PassOutcome, ScanPipeline};
pub use record::SymbolRecord;
pub use screener::{ScanResult, ScannerConfig, ScreenKind, UniverseEvaluator};
pub use sink::{CsvTableSink, ResultSink, Table};
pub use universe::BadSymbolLedger;
