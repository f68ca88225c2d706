use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

/// The single place error bodies are rendered. Handlers, guards and the
/// panic layer attach their [`AppError`] to the response; this replaces the
/// body with the rendering for the running environment.
pub async fn normalize_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(err) = response.extensions_mut().remove::<Arc<AppError>>() else {
        return response;
    };

    if err.is_operational() {
        tracing::debug!(%method, %path, status = %err.status_code(), "{}", err.message());
    } else {
        err.log();
    }

    let (status, body) = err.render(state.config.environment);
    let headers = std::mem::take(response.headers_mut());
    let mut rendered = (status, Json(body)).into_response();
    for (name, value) in headers.iter() {
        if name != axum::http::header::CONTENT_LENGTH && name != axum::http::header::CONTENT_TYPE {
            rendered.headers_mut().append(name.clone(), value.clone());
        }
    }
    rendered
}
