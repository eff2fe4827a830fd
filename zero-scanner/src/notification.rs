//! Alert delivery.
//!
//! Formats the newly qualifying symbols into a single Markdown message and
//! delivers it through an [`AlertChannel`]. The Telegram channel posts to
//! the Bot API directly.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use zero_common::util::{sanitize_for_log, truncate_with_ellipsis};

use crate::alert_state::AlertDelta;
use crate::screener::ScreenKind;

// ============================================================================
// Message Formatting
// ============================================================================

/// Render the alert text, or `None` when nothing is new.
///
/// Each screen with new symbols gets a `*Name* (n):` heading followed by one
/// symbol per line and a blank line. The results location, if any, comes
/// last.
pub fn format_alert_message(delta: &AlertDelta, results: Option<&str>) -> Option<String> {
    if delta.is_empty() {
        return None;
    }

    let mut msg = String::new();
    for screen in ScreenKind::ALERTING {
        let fresh = delta.new_for(screen);
        if fresh.is_empty() {
            continue;
        }
        msg.push_str(&format!("*{}* ({}):\n", screen, fresh.len()));
        msg.push_str(&fresh.join("\n"));
        msg.push_str("\n\n");
    }

    if let Some(location) = results {
        msg.push_str(&format!("Results: {}", location));
    }

    Some(msg)
}

// ============================================================================
// Alert Channel
// ============================================================================

/// Outbound alert channel.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the channel has what it needs to deliver.
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, text: &str) -> Result<()>;
}

/// Telegram Bot API `sendMessage` request
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Telegram Bot API response envelope
#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

/// Telegram delivery with linear-backoff retry.
pub struct TelegramChannel {
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
    retry_count: u32,
    retry_base: Duration,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(
        api_base: impl Into<String>,
        token: Option<String>,
        chat_id: Option<String>,
        retry_count: u32,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let api_base: String = api_base.into();

        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            chat_id: chat_id.filter(|c| !c.is_empty()),
            retry_count: retry_count.max(1),
            retry_base: Duration::from_millis(500),
            client,
        }
    }

    /// Build from shared secrets and scanner output settings.
    pub fn from_config(
        config: &zero_common::Config,
        output: &crate::screener::OutputConfig,
    ) -> Self {
        Self::new(
            output.telegram_api_base.clone(),
            config.secrets.telegram_bot_token.clone(),
            config.secrets.telegram_chat_id.clone(),
            output.retry_count,
        )
    }

    /// Override the backoff unit (attempt `n` waits `n * base`).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    async fn try_send(&self, url: &str, request: &SendMessageRequest<'_>) -> Result<()> {
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, truncate_with_ellipsis(&error_text, 200));
        }

        let result: SendMessageResponse = response.json().await?;
        if result.ok {
            Ok(())
        } else {
            anyhow::bail!(
                "Send failed: {}",
                result.description.unwrap_or_else(|| "Unknown error".to_string())
            )
        }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    async fn send(&self, text: &str) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            warn!("Telegram not configured, skipping alert");
            return Ok(());
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
        };

        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.try_send(&url, &request).await {
                Ok(()) => {
                    info!(chat_id = %chat_id, "Telegram alert sent");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %sanitize_for_log(&e.to_string()),
                        "Failed to send alert, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < self.retry_count {
                        tokio::time::sleep(self.retry_base * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }
}
