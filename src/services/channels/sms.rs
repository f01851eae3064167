//! SMS channel through the Twilio REST API.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChannelSender, SendError, SendResult};
use crate::config::SmsConfig;
use crate::db::Channel;

const MIN_PHONE_DIGITS: usize = 10;

/// Strip everything but digits; `None` when fewer than ten digits remain.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

/// Error document returned by Twilio for rejected requests.
#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<i64>,
    message: String,
}

#[derive(Clone)]
pub struct SmsSender {
    client: reqwest::Client,
    config: SmsConfig,
}

impl SmsSender {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn messages_url(&self, account_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            account_sid
        )
    }
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, address: &str, _title: &str, body: &str) -> SendResult {
        if address.trim().is_empty() {
            return Err(SendError::Validation(
                "Phone number is not specified".to_string(),
            ));
        }

        let Some(digits) = normalize_phone(address) else {
            return Err(SendError::Validation(format!(
                "Invalid phone number format: {}",
                address
            )));
        };

        let (Some(account_sid), Some(auth_token), Some(from_number)) = (
            self.config.account_sid.as_deref(),
            self.config.auth_token.as_deref(),
            self.config.from_number.as_deref(),
        ) else {
            tracing::error!("Twilio SMS service is not configured");
            return Err(SendError::NotConfigured(
                "Twilio SMS service is not configured".to_string(),
            ));
        };

        let to = format!("+{}", digits);
        let response = self
            .client
            .post(self.messages_url(account_sid))
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("To", to.as_str()), ("From", from_number), ("Body", body)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send SMS: {}", e);
                SendError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            match response.json::<TwilioMessage>().await {
                Ok(sent) => tracing::info!("SMS sent, SID: {}", sent.sid),
                Err(_) => tracing::info!("SMS sent to {}", to),
            }
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<TwilioError>(&text) {
            Ok(err) => {
                tracing::warn!("Twilio rejected SMS (code {:?}): {}", err.code, err.message);
                Err(SendError::Rejected(format!("Twilio error: {}", err.message)))
            }
            Err(_) => {
                tracing::error!("Twilio HTTP error ({}): {}", status, text);
                Err(SendError::Transport(format!(
                    "Twilio HTTP error ({}): {}",
                    status, text
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured(api_base: &str) -> SmsConfig {
        SmsConfig {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("token".to_string()),
            from_number: Some("+15550000000".to_string()),
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn normalizes_formatted_numbers() {
        assert_eq!(
            normalize_phone("+1 (555) 123-4567").as_deref(),
            Some("15551234567")
        );
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("phone: 555-12"), None);
    }

    #[tokio::test]
    async fn short_numbers_are_rejected_with_the_input() {
        let sender = SmsSender::new(crate::config::Config::default().sms);

        assert_eq!(
            sender.send("12345", "t", "b").await,
            Err(SendError::Validation(
                "Invalid phone number format: 12345".to_string()
            ))
        );
        assert_eq!(
            sender.send("", "t", "b").await,
            Err(SendError::Validation(
                "Phone number is not specified".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn valid_number_without_settings_is_not_configured() {
        let sender = SmsSender::new(crate::config::Config::default().sms);

        assert_eq!(
            sender.send("+1 (555) 123-4567", "t", "b").await,
            Err(SendError::NotConfigured(
                "Twilio SMS service is not configured".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn posts_normalized_number_to_twilio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B15551234567"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SM1" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sender = SmsSender::new(configured(&server.uri()));
        assert_eq!(sender.send("+1 (555) 123-4567", "t", "hello").await, Ok(()));
    }

    #[tokio::test]
    async fn surfaces_twilio_rejection_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let sender = SmsSender::new(configured(&server.uri()));
        assert_eq!(
            sender.send("5551234567", "t", "b").await,
            Err(SendError::Rejected(
                "Twilio error: The 'To' number is not a valid phone number.".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn unreadable_error_body_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let sender = SmsSender::new(configured(&server.uri()));
        assert!(matches!(
            sender.send("5551234567", "t", "b").await,
            Err(SendError::Transport(_))
        ));
    }
}
