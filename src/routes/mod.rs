use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod health;
pub mod jobs;
pub mod notifications;
pub mod recipients;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/recipients", recipients::router())
        .nest("/api/notifications", notifications::router())
        .nest("/api/jobs", jobs::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
