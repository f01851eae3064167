use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Channel;

/// Immutable log entry for one channel attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: String,
    pub notification_id: String,
    pub channel: Channel,
    pub status: bool,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeliveryAttempt {
    pub notification_id: String,
    pub channel: Channel,
    pub status: bool,
    pub error_message: Option<String>,
}
