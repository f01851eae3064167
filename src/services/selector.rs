use crate::db::{Channel, ContactProfile};

/// Channels eligible for `profile`, in fixed priority order (email, SMS, Telegram).
/// A channel is eligible iff its contact field is populated.
pub fn select_channels(profile: &ContactProfile) -> Vec<Channel> {
    Channel::ALL
        .into_iter()
        .filter(|channel| profile.address_for(*channel).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(email: Option<&str>, phone: Option<&str>, chat: Option<&str>) -> ContactProfile {
        ContactProfile {
            recipient_id: "r".to_string(),
            email: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            telegram_chat_id: chat.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn all_fields_give_fixed_order() {
        let p = profile(Some("a@b.co"), Some("5551234567"), Some("42"));
        assert_eq!(
            select_channels(&p),
            vec![Channel::Email, Channel::Sms, Channel::Telegram]
        );
    }

    #[test]
    fn only_populated_fields_are_included() {
        assert_eq!(
            select_channels(&profile(None, Some("5551234567"), Some("42"))),
            vec![Channel::Sms, Channel::Telegram]
        );
        assert_eq!(
            select_channels(&profile(Some("a@b.co"), None, Some("42"))),
            vec![Channel::Email, Channel::Telegram]
        );
        assert_eq!(
            select_channels(&profile(None, Some(""), Some("42"))),
            vec![Channel::Telegram]
        );
    }

    #[test]
    fn empty_profile_selects_nothing() {
        assert!(select_channels(&profile(None, None, None)).is_empty());
    }
}
