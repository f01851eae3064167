use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` when the database answers, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    /// Dispatch jobs waiting for the worker; absent when the database is down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_jobs: Option<i64>,
    pub timestamp: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pending_jobs = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM dispatch_jobs WHERE status = 'pending'",
    )
    .fetch_one(&state.db)
    .await
    .map_err(|e| tracing::warn!("Health check database query failed: {}", e))
    .ok();

    let database = pending_jobs.is_some();
    let (status_code, status) = if database {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        pending_jobs,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::routes::testing::{request, test_app};

    #[tokio::test]
    async fn reports_healthy_with_queue_depth() {
        let (app, _) = test_app().await;
        let (status, body) = request(&app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["database"], true);
        assert_eq!(body["pending_jobs"], 0);
    }

    #[tokio::test]
    async fn reports_degraded_when_database_is_closed() {
        let (app, state) = test_app().await;
        state.db.close().await;

        let (status, body) = request(&app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], false);
        assert!(body.get("pending_jobs").is_none());
    }
}
