//! Alert state tracking.
//!
//! Remembers which symbols have already been announced per alerting screen so
//! that each symbol is alerted at most once. Membership only grows: a symbol
//! leaving a screen and re-entering it later is not announced again.
//!
//! The tracker moves through two states. It is `Loaded` with the persisted
//! membership, and `reconcile` turns the current pass's membership into the
//! per-screen delta and the grown state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::screener::ScreenKind;

// ============================================================================
// Alert State
// ============================================================================

/// Persisted membership of the alerting screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    #[serde(default)]
    pub trending: Vec<String>,
    #[serde(default)]
    pub retest200: Vec<String>,
    /// Screens this build does not alert on, carried through unchanged
    #[serde(flatten)]
    pub other: BTreeMap<String, Vec<String>>,
}

impl AlertState {
    /// Already-alerted symbols for a screen. Non-alerting screens have none.
    pub fn alerted(&self, screen: ScreenKind) -> &[String] {
        match screen {
            ScreenKind::Trending => &self.trending,
            ScreenKind::Retest200 => &self.retest200,
            ScreenKind::FundamentalStrong => &[],
        }
    }

    fn alerted_mut(&mut self, screen: ScreenKind) -> Option<&mut Vec<String>> {
        match screen {
            ScreenKind::Trending => Some(&mut self.trending),
            ScreenKind::Retest200 => Some(&mut self.retest200),
            ScreenKind::FundamentalStrong => None,
        }
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

/// Newly qualifying symbols per alerting screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertDelta {
    pub trending: Vec<String>,
    pub retest200: Vec<String>,
}

impl AlertDelta {
    pub fn new_for(&self, screen: ScreenKind) -> &[String] {
        match screen {
            ScreenKind::Trending => &self.trending,
            ScreenKind::Retest200 => &self.retest200,
            ScreenKind::FundamentalStrong => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trending.is_empty() && self.retest200.is_empty()
    }

    pub fn total(&self) -> usize {
        self.trending.len() + self.retest200.len()
    }
}

/// Loaded alert state awaiting the current pass's membership.
#[derive(Debug, Clone, Default)]
pub struct AlertTracker {
    state: AlertState,
}

impl AlertTracker {
    pub fn new(state: AlertState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Compute `current - prior` per alerting screen (preserving current
    /// order, each symbol once) and append the delta to the state.
    pub fn reconcile<F>(mut self, current: F) -> (AlertDelta, AlertState)
    where
        F: Fn(ScreenKind) -> Vec<String>,
    {
        let mut delta = AlertDelta::default();

        for screen in ScreenKind::ALERTING {
            let mut seen: HashSet<String> = self.state.alerted(screen).iter().cloned().collect();
            let fresh: Vec<String> = current(screen)
                .into_iter()
                .filter(|s| seen.insert(s.clone()))
                .collect();

            debug!(screen = %screen, new = fresh.len(), "Reconciled alert state");

            if let Some(alerted) = self.state.alerted_mut(screen) {
                alerted.extend(fresh.iter().cloned());
            }
            match screen {
                ScreenKind::Trending => delta.trending = fresh,
                ScreenKind::Retest200 => delta.retest200 = fresh,
                ScreenKind::FundamentalStrong => {}
            }
        }

        (delta, self.state)
    }
}

// ============================================================================
// Alert State Store
// ============================================================================

/// Persistence for [`AlertState`].
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    async fn load(&self) -> Result<AlertState>;

    async fn save(&self, state: &AlertState) -> Result<()>;
}

/// JSON file store. Writes go through a sibling temp file and a rename.
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl AlertStateStore for JsonFileStateStore {
    /// Missing or unparsable files load as empty state.
    async fn load(&self) -> Result<AlertState> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No alert state yet");
                return Ok(AlertState::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read alert state {}", self.path.display()))
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Alert state unreadable, starting empty"
                );
                Ok(AlertState::default())
            }
        }
    }

    async fn save(&self, state: &AlertState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(state).context("Failed to encode alert state")?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}
