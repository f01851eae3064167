use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Delivery Attempt Repository
// ============================================================================

/// Append-only access to the attempt log.
pub struct DeliveryAttemptRepository;

fn parse_channel(raw: String) -> AppResult<Channel> {
    Channel::try_from(raw).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
}

fn row_to_attempt(r: SqliteRow) -> AppResult<DeliveryAttempt> {
    Ok(DeliveryAttempt {
        id: r.get("id"),
        notification_id: r.get("notification_id"),
        channel: parse_channel(r.get("channel"))?,
        status: r.get("status"),
        error_message: r.get("error_message"),
        created_at: r.get("created_at"),
    })
}

impl DeliveryAttemptRepository {
    pub async fn create(
        pool: &SqlitePool,
        attempt: CreateDeliveryAttempt,
    ) -> AppResult<DeliveryAttempt> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO delivery_attempts (
                id, notification_id, channel, status, error_message, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, notification_id, channel, status, error_message, created_at
            "#,
        )
        .bind(id)
        .bind(attempt.notification_id)
        .bind(attempt.channel.as_str())
        .bind(attempt.status)
        .bind(attempt.error_message)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        row_to_attempt(row)
    }

    /// All attempts for a notification in the order they were made.
    pub async fn find_by_notification(
        pool: &SqlitePool,
        notification_id: &str,
    ) -> AppResult<Vec<DeliveryAttempt>> {
        let rows = sqlx::query(
            r#"
            SELECT id, notification_id, channel, status, error_message, created_at
            FROM delivery_attempts
            WHERE notification_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(notification_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        rows.into_iter().map(row_to_attempt).collect()
    }

    /// Distinct channels ever tried for a notification, in priority order.
    pub async fn distinct_channels(
        pool: &SqlitePool,
        notification_id: &str,
    ) -> AppResult<Vec<Channel>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT channel FROM delivery_attempts WHERE notification_id = ?",
        )
        .bind(notification_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut channels = names
            .into_iter()
            .map(parse_channel)
            .collect::<AppResult<Vec<_>>>()?;
        channels.sort();
        Ok(channels)
    }
}
