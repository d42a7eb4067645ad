use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::reminder;
use crate::service::ReminderService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReminderService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReminderRequest {
    pub owner_id: String,
    pub name: String,
    pub hour: u32,
    pub minute: u32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/reminders", post(create_reminder))
        .route("/health", get(handle_health))
        .with_state(state)
}

async fn create_reminder(
    State(state): State<AppState>,
    Json(req): Json<CreateReminderRequest>,
) -> Response {
    if let Err(e) = reminder::validate(&req.owner_id, &req.name, req.hour, req.minute) {
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }

    match state
        .service
        .create(&req.owner_id, &req.name, req.hour, req.minute)
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => {
            tracing::error!("Failed to create reminder: {e:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn handle_health() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
