use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Recipient Repository
// ============================================================================

pub struct RecipientRepository;

impl RecipientRepository {
    pub async fn create(pool: &SqlitePool, username: &str) -> AppResult<Recipient> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Recipient>(
            r#"
            INSERT INTO recipients (id, username, created_at)
            VALUES (?, ?, ?)
            RETURNING id, username, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Recipient>> {
        sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id, username, created_at
            FROM recipients
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_profile(
        pool: &SqlitePool,
        recipient_id: &str,
    ) -> AppResult<Option<ContactProfile>> {
        sqlx::query_as::<_, ContactProfile>(
            r#"
            SELECT recipient_id, email, phone_number, telegram_chat_id, updated_at
            FROM contact_profiles
            WHERE recipient_id = ?
            "#,
        )
        .bind(recipient_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Create or replace the contact profile of a recipient.
    pub async fn upsert_profile(
        pool: &SqlitePool,
        recipient_id: &str,
        profile: UpsertContactProfile,
    ) -> AppResult<ContactProfile> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, ContactProfile>(
            r#"
            INSERT INTO contact_profiles (recipient_id, email, phone_number, telegram_chat_id, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(recipient_id) DO UPDATE SET
                email = excluded.email,
                phone_number = excluded.phone_number,
                telegram_chat_id = excluded.telegram_chat_id,
                updated_at = excluded.updated_at
            RETURNING recipient_id, email, phone_number, telegram_chat_id, updated_at
            "#,
        )
        .bind(recipient_id)
        .bind(profile.email)
        .bind(profile.phone_number)
        .bind(profile.telegram_chat_id)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn upsert_profile_replaces_existing_fields() {
        let pool = test_pool().await;
        let recipient = RecipientRepository::create(&pool, "alice").await.unwrap();

        RecipientRepository::upsert_profile(
            &pool,
            &recipient.id,
            UpsertContactProfile {
                email: Some("alice@example.org".to_string()),
                phone_number: Some("+15551234567".to_string()),
                telegram_chat_id: None,
            },
        )
        .await
        .unwrap();

        let updated = RecipientRepository::upsert_profile(
            &pool,
            &recipient.id,
            UpsertContactProfile {
                email: None,
                phone_number: None,
                telegram_chat_id: Some("42".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.email, None);
        assert_eq!(updated.telegram_chat_id.as_deref(), Some("42"));

        let found = RecipientRepository::find_profile(&pool, &recipient.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.phone_number, None);
        assert_eq!(found.telegram_chat_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn missing_recipient_and_profile_are_none() {
        let pool = test_pool().await;

        assert!(RecipientRepository::find_by_id(&pool, "nope")
            .await
            .unwrap()
            .is_none());
        assert!(RecipientRepository::find_profile(&pool, "nope")
            .await
            .unwrap()
            .is_none());
    }
}
