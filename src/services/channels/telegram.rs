//! Chat-bot channel through the Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChannelSender, SendError, SendResult};
use crate::config::TelegramConfig;
use crate::db::Channel;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct TelegramMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'static str,
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
}

#[derive(Clone)]
pub struct TelegramSender {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig) -> reqwest::Result<Self> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: TelegramConfig, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn api_url(&self, token: &str, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            token,
            method
        )
    }
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(&self, address: &str, _title: &str, body: &str) -> SendResult {
        let chat_id = address.trim();
        if chat_id.is_empty() {
            return Err(SendError::Validation(
                "Telegram chat ID is not specified".to_string(),
            ));
        }

        let Some(token) = self.config.bot_token.as_deref() else {
            tracing::error!("Telegram bot token is not configured");
            return Err(SendError::NotConfigured(
                "Telegram bot token is not configured".to_string(),
            ));
        };

        let message = TelegramMessage {
            chat_id,
            text: body,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(self.api_url(token, "sendMessage"))
            .json(&message)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                // Strip the URL: it embeds the bot token.
                let e = e.without_url();
                tracing::error!("HTTP error while sending to Telegram: {}", e);
                SendError::Transport(format!("Telegram service error: {}", e))
            })?;

        let result: BotApiResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            tracing::error!("Unreadable Telegram response: {}", e);
            SendError::Transport(format!("Telegram service error: {}", e))
        })?;

        if result.ok {
            tracing::info!("Telegram message sent to chat {}", chat_id);
            Ok(())
        } else {
            let description = result
                .description
                .unwrap_or_else(|| "Unknown error".to_string());
            tracing::warn!("Telegram rejected message: {}", description);
            Err(SendError::Rejected(description))
        }
    }
}
