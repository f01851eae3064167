use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::Channel;

/// A person notifications are addressed to.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub username: String,
    pub created_at: NaiveDateTime,
}

/// Per-channel contact identifiers of a recipient. Only populated fields make a
/// channel eligible for delivery.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct ContactProfile {
    pub recipient_id: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub updated_at: NaiveDateTime,
}

impl ContactProfile {
    /// Contact address used for `channel`, if the corresponding field is non-blank.
    pub fn address_for(&self, channel: Channel) -> Option<&str> {
        let field = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Sms => self.phone_number.as_deref(),
            Channel::Telegram => self.telegram_chat_id.as_deref(),
        };
        field.filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertContactProfile {
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub telegram_chat_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_have_no_address() {
        let profile = ContactProfile {
            email: Some("   ".to_string()),
            phone_number: Some("+1 555 123 4567".to_string()),
            ..Default::default()
        };

        assert_eq!(profile.address_for(Channel::Email), None);
        assert_eq!(profile.address_for(Channel::Sms), Some("+1 555 123 4567"));
        assert_eq!(profile.address_for(Channel::Telegram), None);
    }
}
