//! Persistence: models and sqlx repositories over a SQLite pool.

pub mod models;
pub mod repository;

pub use models::*;
pub use repository::*;

/// In-memory database with migrations applied. A single connection keeps every
/// query on the same in-memory database.
#[cfg(test)]
pub async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    pool
}
