//! Telegram delivery of the rendered report.

use std::time::Duration;

use crate::config::TelegramConfig;
use crate::errors::{CheckerError, Result};

/// Longest message the Bot API accepts, in characters.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Split `message` into contiguous pieces of at most `limit` characters.
///
/// Splits never fall inside a UTF-8 sequence.
pub fn chunk_message(message: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = message;

    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(limit)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// Outcome of one delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub sent: usize,
    pub failed: usize,
}

impl DeliverySummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

pub struct TelegramNotifier {
    config: Option<TelegramConfig>,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// `None` credentials turn every send into a logged no-op.
    pub fn new(config: Option<TelegramConfig>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| CheckerError::configuration(format!("HTTP client setup: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Send `message` chunk by chunk; a failed chunk does not stop the rest.
    pub async fn send(&self, message: &str) -> DeliverySummary {
        let mut summary = DeliverySummary::default();
        let Some(config) = &self.config else {
            tracing::warn!("Telegram credentials not set, skipping notification");
            return summary;
        };

        let url = format!("{}/bot{}/sendMessage", config.api_base, config.bot_token);
        let chunks = chunk_message(message, TELEGRAM_MESSAGE_LIMIT);
        tracing::debug!(
            chunks = chunks.len(),
            token = %config.masked_token(),
            "sending report to Telegram"
        );

        for (index, chunk) in chunks.iter().enumerate() {
            match self.send_chunk(&url, &config.chat_id, chunk).await {
                Ok(()) => summary.sent += 1,
                Err(e) => {
                    tracing::warn!(chunk = index, error = %e, "failed to send Telegram message chunk");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn send_chunk(&self, url: &str, chat_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .form(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await
            // reqwest errors embed the URL, which carries the token
            .map_err(|e| CheckerError::Notification {
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CheckerError::Notification {
                reason: format!("Bot API answered {status}"),
            })
        }
    }
}
