//! Email channel over SMTP.

use async_trait::async_trait;
use lazy_static::lazy_static;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use regex::Regex;

use super::{ChannelSender, SendError, SendResult};
use crate::config::{EmailBackend, EmailConfig};
use crate::db::Channel;

/// Host shipped in sample settings; treated the same as no host at all.
const PLACEHOLDER_HOST: &str = "smtp.example.com";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}

pub struct EmailSender {
    config: EmailConfig,
    /// Pooled SMTP transport, present only for a configured `smtp` backend.
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

/// Validated SMTP settings.
struct SmtpSettings<'a> {
    host: &'a str,
    username: &'a str,
    password: &'a str,
    from_address: &'a str,
}

fn smtp_settings(config: &EmailConfig) -> Option<SmtpSettings<'_>> {
    let host = config
        .host
        .as_deref()
        .filter(|h| !h.trim().is_empty() && *h != PLACEHOLDER_HOST)?;
    let username = config.username.as_deref()?;
    let password = config.password.as_deref()?;
    let from_address = config.from_address.as_deref()?;

    Some(SmtpSettings {
        host,
        username,
        password,
        from_address,
    })
}

fn build_transport(
    config: &EmailConfig,
    settings: &SmtpSettings<'_>,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, lettre::transport::smtp::Error> {
    let builder = if config.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(settings.host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host)
    };

    let credentials = Credentials::new(
        settings.username.to_string(),
        settings.password.to_string(),
    );

    Ok(builder
        .port(config.port)
        .credentials(credentials)
        .build())
}

impl EmailSender {
    /// Fails only when the relay's TLS parameters cannot be built from the host.
    pub fn new(config: EmailConfig) -> Result<Self, lettre::transport::smtp::Error> {
        let transport = match (config.backend, smtp_settings(&config)) {
            (EmailBackend::Smtp, Some(settings)) => Some(build_transport(&config, &settings)?),
            _ => None,
        };

        Ok(Self { config, transport })
    }

    fn build_message(
        &self,
        from_address: &str,
        to: &str,
        title: &str,
        body: &str,
    ) -> Result<Message, SendError> {
        let from = from_address
            .parse::<Mailbox>()
            .map_err(|e| SendError::NotConfigured(format!("Invalid sender address: {}", e)))?;
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| SendError::Validation(format!("Invalid email address: {}", e)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(title)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| SendError::Transport(format!("Failed to build email message: {}", e)))
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, address: &str, title: &str, body: &str) -> SendResult {
        let address = address.trim();
        if address.is_empty() {
            return Err(SendError::Validation(
                "Email address is not specified".to_string(),
            ));
        }
        if !is_valid_email(address) {
            return Err(SendError::Validation("Invalid email address".to_string()));
        }

        let Some(settings) = smtp_settings(&self.config) else {
            tracing::error!("SMTP server settings are not configured");
            return Err(SendError::NotConfigured(
                "SMTP server settings are not configured".to_string(),
            ));
        };

        let message = self.build_message(settings.from_address, address, title, body)?;

        if self.config.backend == EmailBackend::Console {
            tracing::warn!("Console email backend in use, message is not actually delivered");
            tracing::info!(
                to = %address,
                subject = %title,
                "Email (console backend):\n{}",
                String::from_utf8_lossy(&message.formatted())
            );
            return Ok(());
        }

        let Some(transport) = self.transport.as_ref() else {
            return Err(SendError::NotConfigured(
                "SMTP server settings are not configured".to_string(),
            ));
        };
        match transport.send(message).await {
            Ok(_) => {
                tracing::info!("Email sent to {}", address);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send email to {}: {}", address, e);
                Err(SendError::Transport(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> EmailConfig {
        EmailConfig {
            backend: EmailBackend::Console,
            host: Some("smtp.mailhost.test".to_string()),
            port: 587,
            use_tls: true,
            username: Some("mailer".to_string()),
            password: Some("secret".to_string()),
            from_address: Some("noreply@mailhost.test".to_string()),
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("user@@bad"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn rejects_invalid_addresses_before_configuration_check() {
        // Unconfigured on purpose: validation must fail first.
        let sender = EmailSender::new(crate::config::Config::default().email).unwrap();

        for bad in ["not-an-email", "user@@bad"] {
            assert_eq!(
                sender.send(bad, "t", "b").await,
                Err(SendError::Validation("Invalid email address".to_string()))
            );
        }
        assert_eq!(
            sender.send("  ", "t", "b").await,
            Err(SendError::Validation(
                "Email address is not specified".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn placeholder_host_counts_as_not_configured() {
        let mut config = configured();
        config.host = Some(PLACEHOLDER_HOST.to_string());
        let sender = EmailSender::new(config).unwrap();

        assert!(matches!(
            sender.send("user@example.com", "t", "b").await,
            Err(SendError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn missing_credentials_count_as_not_configured() {
        let mut config = configured();
        config.username = None;
        let sender = EmailSender::new(config).unwrap();

        assert!(matches!(
            sender.send("user@example.com", "t", "b").await,
            Err(SendError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn console_backend_succeeds_without_network() {
        let sender = EmailSender::new(configured()).unwrap();
        assert_eq!(sender.send("user@example.com", "Hi", "Body").await, Ok(()));
    }

    #[tokio::test]
    async fn missing_password_counts_as_not_configured() {
        let mut config = configured();
        config.password = None;
        let sender = EmailSender::new(config).unwrap();

        assert!(matches!(
            sender.send("user@example.com", "t", "b").await,
            Err(SendError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn smtp_connection_failure_is_a_transport_failure() {
        let mut config = configured();
        config.backend = EmailBackend::Smtp;
        config.host = Some("127.0.0.1".to_string());
        config.port = 1;
        config.use_tls = false;
        let sender = EmailSender::new(config).unwrap();

        match sender.send("user@example.com", "Hi", "Body").await {
            Err(SendError::Transport(msg)) => assert!(!msg.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
