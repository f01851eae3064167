use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{DispatchJob, QueuedJob};
use crate::error::{AppError, AppResult};

/// Repository for the persistent dispatch job queue.
///
/// Delivery is at-least-once:
/// - Claiming uses an atomic single-statement UPDATE with a subselect:
///   `UPDATE ... WHERE id = (SELECT id FROM ... LIMIT 1) RETURNING ...`
/// - Rows left in `processing` by a crashed worker are returned to `pending`
///   by [`DispatchQueueRepository::requeue_stale`], so a job can run twice.
pub struct DispatchQueueRepository;

impl DispatchQueueRepository {
    /// Enqueue a job for the background worker. Returns as soon as the row is stored.
    pub async fn enqueue(
        pool: &SqlitePool,
        job: &DispatchJob,
        max_attempts: i32,
    ) -> AppResult<QueuedJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let channels_json = match &job.channels {
            Some(channels) => Some(
                serde_json::to_string(channels)
                    .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
            ),
            None => None,
        };

        sqlx::query_as::<_, QueuedJob>(
            r#"
            INSERT INTO dispatch_jobs (
                id,
                recipient_id,
                title,
                message,
                channels_json,
                notification_id,
                status,
                attempts,
                max_attempts,
                next_attempt_at,
                last_error,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?, NULL, ?, ?)
            RETURNING
                id,
                recipient_id,
                title,
                message,
                channels_json,
                notification_id,
                status,
                attempts,
                max_attempts,
                next_attempt_at,
                last_error,
                created_at,
                updated_at
            "#,
        )
        .bind(id)
        .bind(&job.recipient_id)
        .bind(&job.title)
        .bind(&job.message)
        .bind(channels_json)
        .bind(&job.notification_id)
        .bind(max_attempts)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Claim up to `limit` due jobs, one atomic statement per job.
    pub async fn fetch_and_claim_due(pool: &SqlitePool, limit: i64) -> AppResult<Vec<QueuedJob>> {
        let mut jobs: Vec<QueuedJob> = Vec::new();
        if limit <= 0 {
            return Ok(jobs);
        }

        for _ in 0..(limit as usize) {
            let now = Utc::now().naive_utc();

            let opt = sqlx::query_as::<_, QueuedJob>(
                r#"
                UPDATE dispatch_jobs
                SET status = 'processing', updated_at = ?
                WHERE id = (
                    SELECT id FROM dispatch_jobs
                    WHERE status = 'pending'
                      AND next_attempt_at <= ?
                    ORDER BY next_attempt_at ASC, created_at ASC
                    LIMIT 1
                )
                RETURNING
                    id,
                    recipient_id,
                    title,
                    message,
                    channels_json,
                    notification_id,
                    status,
                    attempts,
                    max_attempts,
                    next_attempt_at,
                    last_error,
                    created_at,
                    updated_at
                "#,
            )
            .bind(now)
            .bind(now)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)?;

            match opt {
                Some(job) => jobs.push(job),
                None => break,
            }
        }

        Ok(jobs)
    }

    pub async fn mark_succeeded(pool: &SqlitePool, id: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE dispatch_jobs SET status = 'succeeded', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Increment attempts, set `next_attempt_at` and `last_error`. Once the
    /// attempt count reaches `max_attempts` the job is moved to `dead`.
    pub async fn register_failure_and_schedule(
        pool: &SqlitePool,
        id: &str,
        next_attempt_at: NaiveDateTime,
        last_error: Option<String>,
    ) -> AppResult<QueuedJob> {
        let now = Utc::now().naive_utc();
        sqlx::query_as::<_, QueuedJob>(
            r#"
            UPDATE dispatch_jobs
            SET
                attempts = attempts + 1,
                next_attempt_at = ?,
                last_error = ?,
                status = CASE WHEN attempts + 1 >= max_attempts THEN 'dead' ELSE 'pending' END,
                updated_at = ?
            WHERE id = ?
            RETURNING
                id,
                recipient_id,
                title,
                message,
                channels_json,
                notification_id,
                status,
                attempts,
                max_attempts,
                next_attempt_at,
                last_error,
                created_at,
                updated_at
            "#,
        )
        .bind(next_attempt_at)
        .bind(last_error)
        .bind(now)
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Move a job to `dead` without further attempts (e.g. undecodable payload).
    pub async fn mark_dead(pool: &SqlitePool, id: &str, last_error: Option<String>) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE dispatch_jobs SET status = 'dead', last_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(last_error)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Return jobs stuck in `processing` since before `claimed_before` to `pending`.
    pub async fn requeue_stale(pool: &SqlitePool, claimed_before: NaiveDateTime) -> AppResult<u64> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE dispatch_jobs
            SET status = 'pending', next_attempt_at = ?, updated_at = ?
            WHERE status = 'processing' AND updated_at < ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(claimed_before)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    pub async fn list_by_status(pool: &SqlitePool, status: &str) -> AppResult<Vec<QueuedJob>> {
        sqlx::query_as::<_, QueuedJob>(
            r#"
            SELECT
                id,
                recipient_id,
                title,
                message,
                channels_json,
                notification_id,
                status,
                attempts,
                max_attempts,
                next_attempt_at,
                last_error,
                created_at,
                updated_at
            FROM dispatch_jobs
            WHERE status = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(status)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}
