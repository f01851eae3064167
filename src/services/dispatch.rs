//! Ordered fallback delivery: try each channel in turn, stop at the first success,
//! and log every attempt.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{
    Channel, CreateDeliveryAttempt, CreateNotification, DeliveryAttemptRepository, DispatchJob,
    Notification, NotificationRepository, RecipientRepository,
};
use crate::error::AppResult;
use crate::services::channels::ChannelSenders;
use crate::services::selector::select_channels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Success,
    Error,
}

/// Orchestrator-level reasons a dispatch ends without delivery. These are
/// reported to the caller as data and never retried here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("Recipient with ID {0} not found")]
    RecipientNotFound(String),

    #[error("Notification with ID {0} not found")]
    NotificationNotFound(String),

    #[error("Recipient profile not found")]
    ProfileNotFound,

    #[error("No available channels for delivery")]
    NoChannelsAvailable,

    #[error("Delivery failed on all channels")]
    AllChannelsFailed,
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::RecipientNotFound(_) => "RECIPIENT_NOT_FOUND",
            DispatchError::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            DispatchError::ProfileNotFound => "PROFILE_NOT_FOUND",
            DispatchError::NoChannelsAvailable => "NO_AVAILABLE_CHANNELS",
            DispatchError::AllChannelsFailed => "ALL_CHANNELS_FAILED",
        }
    }
}

/// Outcome of one dispatch run, returned to the queue worker or admin caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl DispatchResult {
    fn delivered(notification_id: &str, channel: Channel) -> Self {
        Self {
            status: DispatchStatus::Success,
            notification_id: Some(notification_id.to_string()),
            channel: Some(channel),
            message: None,
            code: None,
        }
    }

    fn failed(notification_id: Option<&str>, error: DispatchError) -> Self {
        Self {
            status: DispatchStatus::Error,
            notification_id: notification_id.map(str::to_string),
            channel: None,
            message: Some(error.to_string()),
            code: Some(error.code()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DispatchStatus::Success
    }
}

#[derive(Clone)]
pub struct DeliveryOrchestrator {
    pool: SqlitePool,
    senders: ChannelSenders,
}

impl DeliveryOrchestrator {
    pub fn new(pool: SqlitePool, senders: ChannelSenders) -> Self {
        Self { pool, senders }
    }

    /// Run one dispatch for `job`.
    ///
    /// Orchestrator-level failures (missing recipient, notification or profile,
    /// no channels, every channel failed) come back as an error `DispatchResult`.
    /// `Err` is reserved for storage faults, which the queue may redeliver.
    ///
    /// Re-running a job for the same notification appends further attempts and
    /// re-asserts the delivered flag.
    pub async fn dispatch(&self, job: &DispatchJob) -> AppResult<DispatchResult> {
        if RecipientRepository::find_by_id(&self.pool, &job.recipient_id)
            .await?
            .is_none()
        {
            tracing::error!("Recipient with ID {} not found", job.recipient_id);
            return Ok(DispatchResult::failed(
                None,
                DispatchError::RecipientNotFound(job.recipient_id.clone()),
            ));
        }

        let notification = match self.resolve_notification(job).await? {
            Ok(notification) => notification,
            Err(error) => {
                tracing::error!("{}", error);
                return Ok(DispatchResult::failed(None, error));
            }
        };

        let Some(profile) = RecipientRepository::find_profile(&self.pool, &job.recipient_id).await?
        else {
            tracing::warn!("Profile for recipient {} not found", job.recipient_id);
            return self
                .finish_undelivered(&notification, DispatchError::ProfileNotFound)
                .await;
        };

        let channels = match &job.channels {
            Some(explicit) => explicit.clone(),
            None => select_channels(&profile),
        };

        if channels.is_empty() {
            tracing::warn!(
                "No available channels for notification {} (recipient {})",
                notification.id,
                job.recipient_id
            );
            return self
                .finish_undelivered(&notification, DispatchError::NoChannelsAvailable)
                .await;
        }

        tracing::info!(
            "Dispatching notification {} via {:?}",
            notification.id,
            channels
        );

        for channel in channels {
            let sender = self.senders.get(channel);
            let address = profile.address_for(channel).unwrap_or_default();
            let outcome = sender.send(address, &job.title, &job.message).await;

            DeliveryAttemptRepository::create(
                &self.pool,
                CreateDeliveryAttempt {
                    notification_id: notification.id.clone(),
                    channel,
                    status: outcome.is_ok(),
                    error_message: outcome.as_ref().err().map(|e| e.to_string()),
                },
            )
            .await?;

            match outcome {
                Ok(()) => {
                    NotificationRepository::set_delivered(&self.pool, &notification.id, true)
                        .await?;
                    tracing::info!(
                        "Notification {} delivered via {}",
                        notification.id,
                        sender.channel()
                    );
                    return Ok(DispatchResult::delivered(&notification.id, channel));
                }
                Err(e) => {
                    tracing::debug!(
                        "Channel {} failed for notification {}: {}",
                        channel,
                        notification.id,
                        e
                    );
                }
            }
        }

        tracing::warn!(
            "Notification {} could not be delivered on any channel",
            notification.id
        );
        self.finish_undelivered(&notification, DispatchError::AllChannelsFailed)
            .await
    }

    /// Reuse the requested notification, or create a fresh one when no id is given.
    /// A requested id that does not exist is an error; no replacement is created.
    async fn resolve_notification(
        &self,
        job: &DispatchJob,
    ) -> AppResult<Result<Notification, DispatchError>> {
        match &job.notification_id {
            Some(id) => match NotificationRepository::find_by_id(&self.pool, id).await? {
                Some(notification) => {
                    if notification.recipient_id != job.recipient_id {
                        tracing::warn!(
                            "Notification {} belongs to recipient {}, dispatching for {}",
                            id,
                            notification.recipient_id,
                            job.recipient_id
                        );
                    }
                    Ok(Ok(notification))
                }
                None => Ok(Err(DispatchError::NotificationNotFound(id.clone()))),
            },
            None => {
                let created = NotificationRepository::create(
                    &self.pool,
                    CreateNotification {
                        recipient_id: job.recipient_id.clone(),
                        title: job.title.clone(),
                        message: job.message.clone(),
                    },
                )
                .await?;
                Ok(Ok(created))
            }
        }
    }

    async fn finish_undelivered(
        &self,
        notification: &Notification,
        error: DispatchError,
    ) -> AppResult<DispatchResult> {
        NotificationRepository::set_delivered(&self.pool, &notification.id, false).await?;
        Ok(DispatchResult::failed(Some(&notification.id), error))
    }
}
