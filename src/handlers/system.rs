// handlers/system.rs - Root banner, health check and the 404 fallback

use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /
pub async fn root() -> ApiResult {
    Ok(ApiResponse::success()
        .with_data("name", json!("Auth CRUD API"))
        .with_data("version", json!(env!("CARGO_PKG_VERSION")))
        .with_data(
            "endpoints",
            json!({
                "health": "/health (public)",
                "auth": "/users/signup, /users/login, /users/forgotPassword, /users/resetPassword/:token (public)",
                "me": "/users/me, /users/updateMe, /users/updatePassword, /users/deleteMe (protected)",
                "users": "/users[/:id] (admin)",
                "sample": "/api/v1/sample[/:id], /api/v1/sample/createOne (public)",
            }),
        ))
}

/// GET /health - 503 when the document store does not answer
pub async fn health(State(state): State<AppState>) -> ApiResult {
    if let Err(e) = state.store.ping().await {
        tracing::warn!("Health check failed: {}", e);
        return Err(AppError::new(StatusCode::SERVICE_UNAVAILABLE, "Document store unavailable"));
    }

    Ok(ApiResponse::success()
        .with_data("store", json!("ok"))
        .with_data("timestamp", json!(Utc::now().to_rfc3339())))
}

/// Fallback for every unmatched route
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
    AppError::not_found(format!("Can't find {} on this server!", target))
}
