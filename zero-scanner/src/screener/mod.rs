//! Screening module.
//!
//! Classifies every symbol in the universe into the screening lists.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐    ┌─────────────────────┐    ┌──────────────────────┐
//! │ Universe  │───▶│  UniverseEvaluator  │───▶│ Fundamental-Strength │
//! └───────────┘    │ provider → snapshot │    └──────────┬───────────┘
//!                  └─────────────────────┘               │ strong only
//!                                               ┌────────┴────────┐
//!                                               ▼                 ▼
//!                                          ┌──────────┐     ┌───────────┐
//!                                          │ Trending │     │ Retest200 │
//!                                          └──────────┘     └───────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use zero_scanner::screener::{ScannerConfig, UniverseEvaluator};
//!
//! let config = ScannerConfig::default();
//! let evaluator = UniverseEvaluator::new(provider, &config);
//! let result = evaluator.evaluate(&symbols).await;
//! println!("{}", result.summary());
//! ```

pub mod config;
pub mod engine;
pub mod report;
pub mod rules;

pub use config::{MarketHoursConfig, OutputConfig, ScannerConfig, ThresholdConfig, UniverseConfig};
pub use engine::{FilterResult, ScanResult, UnavailableSymbol, UniverseEvaluator, ALL_TABLE};
pub use report::{ReportFormat, ScanReport};
pub use rules::{FundamentalStrength, Rejection, Retest200, Screen, ScreenKind, Trending};
