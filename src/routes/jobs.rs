use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::{DispatchQueueRepository, QueuedJob};
use crate::error::{AppError, AppResult};
use crate::AppState;

const STATUSES: [&str; 4] = ["pending", "processing", "succeeded", "dead"];

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_jobs))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
}

/// Inspect the dispatch queue by status (defaults to `pending`).
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Json<Vec<QueuedJob>>> {
    let status = query.status.as_deref().unwrap_or("pending");
    if !STATUSES.contains(&status) {
        return Err(AppError::BadRequest(format!(
            "Unknown job status '{}'",
            status
        )));
    }

    Ok(Json(
        DispatchQueueRepository::list_by_status(&state.db, status).await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use crate::routes::testing::{request, test_app};

    #[tokio::test]
    async fn rejects_unknown_status() {
        let (app, _) = test_app().await;
        let (status, _) = request(&app, Method::GET, "/api/jobs?status=lost", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_empty_queue() {
        let (app, _) = test_app().await;
        let (status, body) = request(&app, Method::GET, "/api/jobs", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(|a| a.len()), Some(0));
    }
}
