use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One logical message to one recipient.
///
/// `is_delivered` is `None` until the first dispatch run finishes, then reflects
/// the outcome of the most recent run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    pub is_delivered: Option<bool>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotification {
    pub recipient_id: String,
    pub title: String,
    pub message: String,
}
