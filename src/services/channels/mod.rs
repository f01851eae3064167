//! Channel senders: one transport per [`Channel`] variant.
//!
//! Every sender validates its input and configuration before touching the
//! network and converts every transport fault into a [`SendError`], so the
//! orchestrator only ever sees data.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::db::Channel;

pub mod email;
pub mod sms;
pub mod telegram;

pub use email::EmailSender;
pub use sms::SmsSender;
pub use telegram::TelegramSender;

/// Why a single channel attempt failed. The `Display` text is what ends up in
/// the delivery attempt log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Malformed or missing contact address.
    #[error("{0}")]
    Validation(String),

    /// Required transport settings are absent.
    #[error("{0}")]
    NotConfigured(String),

    /// Network, protocol or local transport fault.
    #[error("{0}")]
    Transport(String),

    /// The remote service answered and refused the message.
    #[error("{0}")]
    Rejected(String),
}

pub type SendResult = Result<(), SendError>;

#[async_trait]
pub trait ChannelSender: Send + Sync + 'static {
    fn channel(&self) -> Channel;

    /// Attempt one delivery to `address`. Never panics on transport faults.
    async fn send(&self, address: &str, title: &str, body: &str) -> SendResult;
}

/// Fixed mapping from channel tag to its sender.
#[derive(Clone)]
pub struct ChannelSenders {
    email: Arc<dyn ChannelSender>,
    sms: Arc<dyn ChannelSender>,
    telegram: Arc<dyn ChannelSender>,
}

impl ChannelSenders {
    pub fn new(
        email: Arc<dyn ChannelSender>,
        sms: Arc<dyn ChannelSender>,
        telegram: Arc<dyn ChannelSender>,
    ) -> Self {
        Self {
            email,
            sms,
            telegram,
        }
    }

    /// Build the production senders from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let email = EmailSender::new(config.email.clone())
            .map_err(|e| anyhow::anyhow!("Failed to set up SMTP transport: {}", e))?;
        let telegram = TelegramSender::new(config.telegram.clone())
            .map_err(|e| anyhow::anyhow!("Failed to build Telegram HTTP client: {}", e))?;

        Ok(Self::new(
            Arc::new(email),
            Arc::new(SmsSender::new(config.sms.clone())),
            Arc::new(telegram),
        ))
    }

    pub fn get(&self, channel: Channel) -> &dyn ChannelSender {
        match channel {
            Channel::Email => self.email.as_ref(),
            Channel::Sms => self.sms.as_ref(),
            Channel::Telegram => self.telegram.as_ref(),
        }
    }
}
