//! Market-hours gate for scheduled runs.
//!
//! Scheduled passes only run on weekdays inside the configured session at
//! the exchange's fixed UTC offset. Manual runs bypass the gate.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Offset, Utc, Weekday};
use std::fmt;

use crate::screener::MarketHoursConfig;

/// Environment variable set by CI to the triggering event name.
pub const EVENT_NAME_VAR: &str = "GITHUB_EVENT_NAME";

/// Event name of a manually dispatched workflow.
pub const MANUAL_EVENT: &str = "workflow_dispatch";

/// Why the gate is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketClosed {
    Weekend,
    OutsideHours,
}

impl fmt::Display for MarketClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekend => write!(f, "Market closed (weekend)"),
            Self::OutsideHours => write!(f, "Market closed (outside trading hours)"),
        }
    }
}

/// Whether this invocation was started by hand.
pub fn is_manual_run(flag: bool, event_name: Option<&str>) -> bool {
    flag || event_name == Some(MANUAL_EVENT)
}

/// Session window evaluated at a fixed UTC offset.
#[derive(Debug, Clone)]
pub struct MarketHours {
    offset: FixedOffset,
    open: NaiveTime,
    close: NaiveTime,
}

impl MarketHours {
    /// Build from config. Unparsable values fall back to the default session.
    pub fn from_config(config: &MarketHoursConfig) -> Self {
        let parse = |s: &str, fallback: (u32, u32)| {
            NaiveTime::parse_from_str(s, "%H:%M").unwrap_or_else(|_| {
                NaiveTime::from_hms_opt(fallback.0, fallback.1, 0).unwrap_or(NaiveTime::MIN)
            })
        };
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60)
            .or_else(|| FixedOffset::east_opt(330 * 60))
            .unwrap_or_else(|| Utc.fix());

        Self {
            offset,
            open: parse(&config.open, (9, 0)),
            close: parse(&config.close, (15, 30)),
        }
    }

    /// `Ok` if a scheduled pass may run at `now`. Open and close are
    /// inclusive.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), MarketClosed> {
        let local = now.with_timezone(&self.offset);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(MarketClosed::Weekend);
        }

        let time = local.time();
        if time < self.open || time > self.close {
            return Err(MarketClosed::OutsideHours);
        }
        Ok(())
    }
}
