use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{
    DeliveryAttempt, DeliveryAttemptRepository, DispatchJob, Notification,
    NotificationRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::admin::{AdminService, CreatedNotification, ResendReport};
use crate::services::dispatch::DispatchResult;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/resend", post(resend_notifications))
        .route("/dispatch", post(dispatch_now))
        .route("/:id", get(get_notification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub delivered: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsListResponse {
    pub items: Vec<Notification>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct NotificationDetailsResponse {
    pub notification: Notification,
    pub attempts: Vec<DeliveryAttempt>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub recipient_id: String,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub ids: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<NotificationsListResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1).saturating_mul(per_page);

    let items = NotificationRepository::list(&state.db, query.delivered, per_page, offset).await?;
    let total = NotificationRepository::count(&state.db, query.delivered).await?;
    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(Json(NotificationsListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    }))
}

/// Create a notification and queue its first delivery.
async fn create_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateNotificationRequest>,
) -> AppResult<(StatusCode, Json<CreatedNotification>)> {
    let admin = AdminService::new(&state.db, &state.config.dispatch_queue);
    let created = admin
        .create_notification(&body.recipient_id, &body.title, &body.message)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<NotificationDetailsResponse>> {
    let notification = NotificationRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
    let attempts = DeliveryAttemptRepository::find_by_notification(&state.db, &id).await?;

    Ok(Json(NotificationDetailsResponse {
        notification,
        attempts,
    }))
}

async fn resend_notifications(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResendRequest>,
) -> AppResult<Json<ResendReport>> {
    if body.ids.is_empty() {
        return Err(AppError::BadRequest("No notifications selected".to_string()));
    }

    let admin = AdminService::new(&state.db, &state.config.dispatch_queue);
    Ok(Json(admin.resend(&body.ids).await?))
}

/// Run a dispatch synchronously and return its outcome.
async fn dispatch_now(
    State(state): State<Arc<AppState>>,
    Json(job): Json<DispatchJob>,
) -> AppResult<Json<DispatchResult>> {
    Ok(Json(state.orchestrator.dispatch(&job).await?))
}
