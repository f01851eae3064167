use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{ContactProfile, UpsertContactProfile};
use crate::error::AppResult;
use crate::services::admin::{AdminService, RecipientDetails};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_recipient))
        .route("/:id", get(get_recipient))
        .route("/:id/profile", put(update_profile))
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipientRequest {
    pub username: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub telegram_chat_id: Option<String>,
}

async fn create_recipient(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRecipientRequest>,
) -> AppResult<(StatusCode, Json<RecipientDetails>)> {
    let admin = AdminService::new(&state.db, &state.config.dispatch_queue);
    let details = admin
        .create_recipient(
            &body.username,
            UpsertContactProfile {
                email: body.email,
                phone_number: body.phone_number,
                telegram_chat_id: body.telegram_chat_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

async fn get_recipient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<RecipientDetails>> {
    let admin = AdminService::new(&state.db, &state.config.dispatch_queue);
    Ok(Json(admin.get_recipient(&id).await?))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpsertContactProfile>,
) -> AppResult<Json<ContactProfile>> {
    let admin = AdminService::new(&state.db, &state.config.dispatch_queue);
    Ok(Json(admin.update_profile(&id, body).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::routes::testing::{request, test_app};

    #[tokio::test]
    async fn create_read_and_update_recipient() {
        let (app, _) = test_app().await;

        let (status, created) = request(
            &app,
            Method::POST,
            "/api/recipients",
            Some(json!({ "username": "nora", "email": "nora@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["recipient"]["id"].as_str().unwrap().to_string();
        assert_eq!(created["profile"]["email"], "nora@example.com");

        let (status, _) = request(
            &app,
            Method::PUT,
            &format!("/api/recipients/{}/profile", id),
            Some(json!({ "telegram_chat_id": "1234" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, fetched) =
            request(&app, Method::GET, &format!("/api/recipients/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["recipient"]["username"], "nora");
        assert_eq!(fetched["profile"]["telegram_chat_id"], "1234");
        assert!(fetched["profile"]["email"].is_null());
    }

    #[tokio::test]
    async fn unknown_recipient_is_not_found() {
        let (app, _) = test_app().await;
        let (status, body) = request(&app, Method::GET, "/api/recipients/nope", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn blank_username_is_rejected() {
        let (app, _) = test_app().await;
        let (status, body) = request(
            &app,
            Method::POST,
            "/api/recipients",
            Some(json!({ "username": "  " })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
