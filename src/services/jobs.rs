//! Job entry point: runs queued dispatch jobs claimed by the background worker.

use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::SqlitePool;

use crate::config::DispatchQueueConfig;
use crate::db::{DispatchQueueRepository, QueuedJob};
use crate::error::AppResult;
use crate::services::dispatch::DeliveryOrchestrator;

/// Delay before the next try of a job that has already faulted `attempts` times.
pub fn backoff_delay(config: &DispatchQueueConfig, attempts: i32) -> Duration {
    let exponent = attempts.clamp(0, 16) as u32;
    let seconds = config
        .initial_backoff_seconds
        .saturating_mul(1u64 << exponent)
        .min(config.max_backoff_seconds);
    Duration::seconds(seconds as i64)
}

/// Process one claimed queue row.
///
/// Any `DispatchResult`, success or orchestrator-level error, completes the job.
/// Only storage faults are rescheduled; a job that keeps faulting ends up `dead`.
pub async fn process_queued_job(
    pool: &SqlitePool,
    orchestrator: &DeliveryOrchestrator,
    config: &DispatchQueueConfig,
    queued: QueuedJob,
) -> AppResult<()> {
    let job = match queued.job() {
        Ok(job) => job,
        Err(e) => {
            tracing::error!("Dispatch job {} has an unreadable payload: {}", queued.id, e);
            DispatchQueueRepository::mark_dead(
                pool,
                &queued.id,
                Some(format!("Invalid job payload: {}", e)),
            )
            .await?;
            return Ok(());
        }
    };

    match orchestrator.dispatch(&job).await {
        Ok(result) => {
            if result.is_success() {
                tracing::info!("Dispatch job {} completed", queued.id);
            } else {
                tracing::warn!(
                    "Dispatch job {} finished without delivery: {}",
                    queued.id,
                    result.message.as_deref().unwrap_or_default()
                );
            }
            DispatchQueueRepository::mark_succeeded(pool, &queued.id).await
        }
        Err(e) => {
            let next = next_attempt_at(config, queued.attempts, Utc::now().naive_utc());
            let updated = DispatchQueueRepository::register_failure_and_schedule(
                pool,
                &queued.id,
                next,
                Some(e.to_string()),
            )
            .await?;
            if updated.status == "dead" {
                tracing::error!(
                    "Dispatch job {} gave up after {} attempts: {}",
                    queued.id,
                    updated.attempts,
                    e
                );
            } else {
                tracing::warn!(
                    "Dispatch job {} failed (attempt {}), retrying at {}: {}",
                    queued.id,
                    updated.attempts,
                    next,
                    e
                );
            }
            Ok(())
        }
    }
}

fn next_attempt_at(config: &DispatchQueueConfig, attempts: i32, now: NaiveDateTime) -> NaiveDateTime {
    now + backoff_delay(config, attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{
        test_pool, Channel, DispatchJob, NotificationRepository, RecipientRepository,
        UpsertContactProfile,
    };
    use crate::services::channels::testing::FakeSender;
    use crate::services::channels::ChannelSenders;

    fn orchestrator(pool: &SqlitePool) -> DeliveryOrchestrator {
        DeliveryOrchestrator::new(
            pool.clone(),
            ChannelSenders::new(
                FakeSender::succeeding(Channel::Email),
                FakeSender::succeeding(Channel::Sms),
                FakeSender::succeeding(Channel::Telegram),
            ),
        )
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let config = Config::default().dispatch_queue;
        assert_eq!(backoff_delay(&config, 0), Duration::seconds(30));
        assert_eq!(backoff_delay(&config, 1), Duration::seconds(60));
        assert_eq!(backoff_delay(&config, 3), Duration::seconds(240));
        assert_eq!(backoff_delay(&config, 12), Duration::seconds(3600));
    }

    #[tokio::test]
    async fn delivered_job_is_marked_succeeded() {
        let pool = test_pool().await;
        let config = Config::default().dispatch_queue;
        let recipient = RecipientRepository::create(&pool, "gina").await.unwrap();
        RecipientRepository::upsert_profile(
            &pool,
            &recipient.id,
            UpsertContactProfile {
                telegram_chat_id: Some("77".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let job = DispatchJob {
            recipient_id: recipient.id.clone(),
            title: "Hi".to_string(),
            message: "Hello".to_string(),
            channels: None,
            notification_id: None,
        };
        DispatchQueueRepository::enqueue(&pool, &job, 5).await.unwrap();
        let claimed = DispatchQueueRepository::fetch_and_claim_due(&pool, 10)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);

        process_queued_job(&pool, &orchestrator(&pool), &config, claimed[0].clone())
            .await
            .unwrap();

        let done = DispatchQueueRepository::list_by_status(&pool, "succeeded")
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(
            NotificationRepository::count(&pool, Some(true)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn orchestrator_errors_are_not_retried() {
        let pool = test_pool().await;
        let config = Config::default().dispatch_queue;
        let job = DispatchJob {
            recipient_id: "nobody".to_string(),
            title: "Hi".to_string(),
            message: "Hello".to_string(),
            channels: None,
            notification_id: None,
        };
        DispatchQueueRepository::enqueue(&pool, &job, 5).await.unwrap();
        let claimed = DispatchQueueRepository::fetch_and_claim_due(&pool, 10)
            .await
            .unwrap();

        process_queued_job(&pool, &orchestrator(&pool), &config, claimed[0].clone())
            .await
            .unwrap();

        let done = DispatchQueueRepository::list_by_status(&pool, "succeeded")
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].attempts, 0);
        assert!(DispatchQueueRepository::list_by_status(&pool, "pending")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unreadable_payload_goes_dead() {
        let pool = test_pool().await;
        let config = Config::default().dispatch_queue;
        let job = DispatchJob {
            recipient_id: "r".to_string(),
            title: "Hi".to_string(),
            message: "Hello".to_string(),
            channels: Some(vec![Channel::Email]),
            notification_id: None,
        };
        let queued = DispatchQueueRepository::enqueue(&pool, &job, 5).await.unwrap();
        sqlx::query("UPDATE dispatch_jobs SET channels_json = '[\"pigeon\"]' WHERE id = ?")
            .bind(&queued.id)
            .execute(&pool)
            .await
            .unwrap();
        let claimed = DispatchQueueRepository::fetch_and_claim_due(&pool, 10)
            .await
            .unwrap();

        process_queued_job(&pool, &orchestrator(&pool), &config, claimed[0].clone())
            .await
            .unwrap();

        let dead = DispatchQueueRepository::list_by_status(&pool, "dead")
            .await
            .unwrap();
        assert_eq!(dead.len(), 1);
        assert!(dead[0]
            .last_error
            .as_deref()
            .unwrap()
            .starts_with("Invalid job payload"));
    }
}
