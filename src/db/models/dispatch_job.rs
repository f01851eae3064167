use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Channel;

/// Unit of work handed to the task queue: deliver one message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    /// Explicit channel order. `None` means auto-select from the contact profile;
    /// an explicit empty list is kept as is.
    #[serde(default)]
    pub channels: Option<Vec<Channel>>,
    /// Existing notification to reuse (resend). `None` creates a fresh one.
    #[serde(default)]
    pub notification_id: Option<String>,
}

/// Persistent queue row wrapping a [`DispatchJob`].
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueuedJob {
    /// Primary key (UUID)
    pub id: String,
    pub recipient_id: String,
    pub title: String,
    pub message: String,

    /// JSON array of channel names, NULL when channels are auto-selected.
    pub channels_json: Option<String>,
    pub notification_id: Option<String>,

    /// 'pending', 'processing', 'succeeded', 'dead'
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_attempt_at: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl QueuedJob {
    /// Rebuild the job payload stored in this row.
    pub fn job(&self) -> Result<DispatchJob, serde_json::Error> {
        let channels = match self.channels_json.as_deref() {
            Some(json) => Some(serde_json::from_str::<Vec<Channel>>(json)?),
            None => None,
        };

        Ok(DispatchJob {
            recipient_id: self.recipient_id.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            channels,
            notification_id: self.notification_id.clone(),
        })
    }
}
