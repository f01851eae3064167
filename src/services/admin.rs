//! Administrative actions: recipient management, notification creation and resend.
//!
//! Delivery itself is never done here. Every send goes through the dispatch queue
//! and the outcome is reported back as notices.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::DispatchQueueConfig;
use crate::db::{
    Channel, ContactProfile, CreateNotification, DeliveryAttemptRepository, DispatchJob,
    DispatchQueueRepository, Notification, NotificationRepository, Recipient,
    RecipientRepository, UpsertContactProfile,
};
use crate::error::{AppError, AppResult};
use crate::services::selector::select_channels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Message surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl AdminNotice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientDetails {
    pub recipient: Recipient,
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedNotification {
    pub notification: Notification,
    /// Queue row id, when a dispatch job was enqueued.
    pub job_id: Option<String>,
    pub notices: Vec<AdminNotice>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResendReport {
    pub queued: usize,
    pub notices: Vec<AdminNotice>,
}

fn channel_list(channels: &[Channel]) -> String {
    channels
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct AdminService<'a> {
    pool: &'a SqlitePool,
    queue: &'a DispatchQueueConfig,
}

impl<'a> AdminService<'a> {
    pub fn new(pool: &'a SqlitePool, queue: &'a DispatchQueueConfig) -> Self {
        Self { pool, queue }
    }

    pub async fn create_recipient(
        &self,
        username: &str,
        profile: UpsertContactProfile,
    ) -> AppResult<RecipientDetails> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username must not be empty".to_string()));
        }

        let recipient = RecipientRepository::create(self.pool, username)
            .await
            .map_err(|e| match e {
                AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    AppError::BadRequest(format!("Username '{}' is already taken", username))
                }
                other => other,
            })?;
        let profile = RecipientRepository::upsert_profile(self.pool, &recipient.id, profile).await?;

        tracing::info!("Created recipient {} ({})", recipient.id, recipient.username);

        Ok(RecipientDetails {
            recipient,
            profile: Some(profile),
        })
    }

    pub async fn get_recipient(&self, id: &str) -> AppResult<RecipientDetails> {
        let recipient = RecipientRepository::find_by_id(self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recipient {} not found", id)))?;
        let profile = RecipientRepository::find_profile(self.pool, id).await?;

        Ok(RecipientDetails { recipient, profile })
    }

    pub async fn update_profile(
        &self,
        recipient_id: &str,
        profile: UpsertContactProfile,
    ) -> AppResult<ContactProfile> {
        if RecipientRepository::find_by_id(self.pool, recipient_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Recipient {} not found",
                recipient_id
            )));
        }

        RecipientRepository::upsert_profile(self.pool, recipient_id, profile).await
    }

    /// Create a notification and enqueue its first dispatch with the recipient's
    /// auto-selected channels. The record is kept even when nothing can be sent.
    pub async fn create_notification(
        &self,
        recipient_id: &str,
        title: &str,
        message: &str,
    ) -> AppResult<CreatedNotification> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".to_string()));
        }
        if RecipientRepository::find_by_id(self.pool, recipient_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Recipient {} not found",
                recipient_id
            )));
        }

        let notification = NotificationRepository::create(
            self.pool,
            CreateNotification {
                recipient_id: recipient_id.to_string(),
                title: title.to_string(),
                message: message.to_string(),
            },
        )
        .await?;

        let channels = self.live_channels(recipient_id).await?;
        if channels.is_empty() {
            tracing::warn!(
                "Notification {} created but recipient {} has no available channels",
                notification.id,
                recipient_id
            );
            return Ok(CreatedNotification {
                notification,
                job_id: None,
                notices: vec![AdminNotice::warning(
                    "Notification created but cannot be sent: no available channels",
                )],
            });
        }

        let queued = self.enqueue(&notification, channels.clone()).await?;
        Ok(CreatedNotification {
            notification,
            job_id: Some(queued),
            notices: vec![AdminNotice::success(format!(
                "Notification queued for delivery via {}",
                channel_list(&channels)
            ))],
        })
    }

    /// Enqueue one dispatch per notification. Channels come from the current
    /// profile, or from the attempt log when the profile offers none.
    pub async fn resend(&self, ids: &[String]) -> AppResult<ResendReport> {
        let mut report = ResendReport::default();

        for id in ids {
            let Some(notification) = NotificationRepository::find_by_id(self.pool, id).await?
            else {
                report
                    .notices
                    .push(AdminNotice::error(format!("Notification {} not found", id)));
                continue;
            };

            let mut channels = self.live_channels(&notification.recipient_id).await?;
            if channels.is_empty() {
                channels = DeliveryAttemptRepository::distinct_channels(self.pool, id).await?;
                if !channels.is_empty() {
                    tracing::info!(
                        "Resending notification {} via previously used channels {:?}",
                        id,
                        channels
                    );
                }
            }

            if channels.is_empty() {
                report.notices.push(AdminNotice::error(format!(
                    "Notification {} cannot be resent: no available channels",
                    id
                )));
                continue;
            }

            match self.enqueue(&notification, channels).await {
                Ok(_) => report.queued += 1,
                Err(e) => {
                    tracing::error!("Failed to enqueue resend of notification {}: {}", id, e);
                    report.notices.push(AdminNotice::error(format!(
                        "Notification {} could not be queued: {}",
                        id, e
                    )));
                }
            }
        }

        if report.queued > 0 {
            report.notices.push(AdminNotice::success(format!(
                "{} notification(s) queued for resend",
                report.queued
            )));
        }

        Ok(report)
    }

    async fn live_channels(&self, recipient_id: &str) -> AppResult<Vec<Channel>> {
        Ok(RecipientRepository::find_profile(self.pool, recipient_id)
            .await?
            .map(|profile| select_channels(&profile))
            .unwrap_or_default())
    }

    async fn enqueue(&self, notification: &Notification, channels: Vec<Channel>) -> AppResult<String> {
        let job = DispatchJob {
            recipient_id: notification.recipient_id.clone(),
            title: notification.title.clone(),
            message: notification.message.clone(),
            channels: Some(channels),
            notification_id: Some(notification.id.clone()),
        };
        let queued =
            DispatchQueueRepository::enqueue(self.pool, &job, self.queue.max_attempts as i32)
                .await?;

        tracing::debug!(
            "Enqueued dispatch job {} for notification {}",
            queued.id,
            notification.id
        );
        Ok(queued.id)
    }
}
