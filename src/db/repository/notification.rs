use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Notification Repository
// ============================================================================

pub struct NotificationRepository;

impl NotificationRepository {
    pub async fn create(
        pool: &SqlitePool,
        notification: CreateNotification,
    ) -> AppResult<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, recipient_id, title, message, is_delivered, created_at)
            VALUES (?, ?, ?, ?, NULL, ?)
            RETURNING id, recipient_id, title, message, is_delivered, created_at
            "#,
        )
        .bind(id)
        .bind(notification.recipient_id)
        .bind(notification.title)
        .bind(notification.message)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, title, message, is_delivered, created_at
            FROM notifications
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Record the outcome of a dispatch run.
    pub async fn set_delivered(pool: &SqlitePool, id: &str, delivered: bool) -> AppResult<()> {
        sqlx::query("UPDATE notifications SET is_delivered = ? WHERE id = ?")
            .bind(delivered)
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Newest first. `delivered` filters on the stored flag when provided.
    pub async fn list(
        pool: &SqlitePool,
        delivered: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, title, message, is_delivered, created_at
            FROM notifications
            WHERE (? IS NULL OR COALESCE(is_delivered, 0) = ?)
            ORDER BY created_at DESC
            LIMIT ?
            OFFSET ?
            "#,
        )
        .bind(delivered)
        .bind(delivered)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count(pool: &SqlitePool, delivered: Option<bool>) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE (? IS NULL OR COALESCE(is_delivered, 0) = ?)",
        )
        .bind(delivered)
        .bind(delivered)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, RecipientRepository};

    #[tokio::test]
    async fn new_notification_is_not_yet_attempted() {
        let pool = test_pool().await;
        let recipient = RecipientRepository::create(&pool, "bob").await.unwrap();

        let created = NotificationRepository::create(
            &pool,
            CreateNotification {
                recipient_id: recipient.id.clone(),
                title: "Hello".to_string(),
                message: "World".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.is_delivered, None);

        NotificationRepository::set_delivered(&pool, &created.id, true)
            .await
            .unwrap();
        let found = NotificationRepository::find_by_id(&pool, &created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.is_delivered, Some(true));
    }

    #[tokio::test]
    async fn list_filters_on_delivered_flag() {
        let pool = test_pool().await;
        let recipient = RecipientRepository::create(&pool, "carol").await.unwrap();

        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            let n = NotificationRepository::create(
                &pool,
                CreateNotification {
                    recipient_id: recipient.id.clone(),
                    title: title.to_string(),
                    message: "body".to_string(),
                },
            )
            .await
            .unwrap();
            ids.push(n.id);
        }
        NotificationRepository::set_delivered(&pool, &ids[0], true)
            .await
            .unwrap();
        NotificationRepository::set_delivered(&pool, &ids[1], false)
            .await
            .unwrap();

        let delivered = NotificationRepository::list(&pool, Some(true), 10, 0)
            .await
            .unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, ids[0]);

        // Never-attempted notifications count as not delivered.
        assert_eq!(
            NotificationRepository::count(&pool, Some(false))
                .await
                .unwrap(),
            2
        );
        assert_eq!(NotificationRepository::count(&pool, None).await.unwrap(), 3);
    }
}
