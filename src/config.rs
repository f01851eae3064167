use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub telegram: TelegramConfig,
    pub dispatch_queue: DispatchQueueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailBackend {
    /// Deliver through the configured SMTP relay.
    Smtp,
    /// Write messages to the log instead of sending them (development only).
    Console,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub backend: EmailBackend,
    pub host: Option<String>,
    pub port: u16,
    /// Use STARTTLS when talking to the relay.
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Sender number registered with the gateway.
    pub from_number: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchQueueConfig {
    /// Whether the background dispatch worker runs.
    pub enabled: bool,
    /// How often (seconds) the worker polls for due jobs.
    pub poll_interval_seconds: u64,
    /// Maximum jobs claimed per poll.
    pub worker_concurrency: u32,
    /// Attempts before a job that keeps faulting is moved to `dead`.
    pub max_attempts: u32,
    pub initial_backoff_seconds: u64,
    /// Cap for exponential backoff (seconds).
    pub max_backoff_seconds: u64,
    /// Jobs left in `processing` longer than this are handed out again.
    pub stale_after_seconds: u64,
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Read an optional setting, treating blank values as unset.
fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let email_backend = match env::var("EMAIL_BACKEND") {
            Ok(v) => match v.to_lowercase().as_str() {
                "smtp" => EmailBackend::Smtp,
                "console" => EmailBackend::Console,
                _ => return Err(ConfigError::InvalidValue("EMAIL_BACKEND".to_string())),
            },
            Err(_) => EmailBackend::Smtp,
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/notifications.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            email: EmailConfig {
                backend: email_backend,
                host: env_opt("EMAIL_HOST"),
                port: env::var("EMAIL_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("EMAIL_PORT".to_string()))?,
                use_tls: env_flag("EMAIL_USE_TLS", true),
                username: env_opt("EMAIL_HOST_USER"),
                password: env_opt("EMAIL_HOST_PASSWORD"),
                from_address: env_opt("DEFAULT_FROM_EMAIL"),
            },
            sms: SmsConfig {
                account_sid: env_opt("TWILIO_ACCOUNT_SID"),
                auth_token: env_opt("TWILIO_AUTH_TOKEN"),
                from_number: env_opt("TWILIO_PHONE_NUMBER"),
                api_base: env::var("TWILIO_API_BASE")
                    .unwrap_or_else(|_| "https://api.twilio.com".to_string()),
            },
            telegram: TelegramConfig {
                bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
                api_base: env::var("TELEGRAM_API_BASE")
                    .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            },
            dispatch_queue: DispatchQueueConfig {
                enabled: env_flag("DISPATCH_QUEUE_ENABLED", true),
                poll_interval_seconds: env::var("DISPATCH_QUEUE_POLL_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2u64),
                worker_concurrency: env::var("DISPATCH_QUEUE_WORKER_CONCURRENCY")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10u32),
                max_attempts: env::var("DISPATCH_QUEUE_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5u32),
                initial_backoff_seconds: env::var("DISPATCH_QUEUE_INITIAL_BACKOFF_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30u64),
                max_backoff_seconds: env::var("DISPATCH_QUEUE_MAX_BACKOFF_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600u64),
                stale_after_seconds: env::var("DISPATCH_QUEUE_STALE_AFTER_SECONDS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600u64),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://data/notifications.db".to_string(),
                max_connections: 5,
            },
            email: EmailConfig {
                backend: EmailBackend::Smtp,
                host: None,
                port: 587,
                use_tls: true,
                username: None,
                password: None,
                from_address: None,
            },
            sms: SmsConfig {
                account_sid: None,
                auth_token: None,
                from_number: None,
                api_base: "https://api.twilio.com".to_string(),
            },
            telegram: TelegramConfig {
                bot_token: None,
                api_base: "https://api.telegram.org".to_string(),
            },
            dispatch_queue: DispatchQueueConfig {
                enabled: true,
                poll_interval_seconds: 2,
                worker_concurrency: 10,
                max_attempts: 5,
                initial_backoff_seconds: 30,
                max_backoff_seconds: 3600,
                stale_after_seconds: 600,
            },
        }
    }
}
