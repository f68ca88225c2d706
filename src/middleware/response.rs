use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Success envelope: `{status: "success", [token], [results], [message], data}`
#[derive(Debug)]
pub struct ApiResponse {
    status_code: StatusCode,
    fields: Map<String, Value>,
    data: Option<Map<String, Value>>,
    headers: HeaderMap,
}

impl ApiResponse {
    /// Create a response with custom status code
    pub fn with_status(status_code: StatusCode) -> Self {
        Self {
            status_code,
            fields: Map::new(),
            data: None,
            headers: HeaderMap::new(),
        }
    }

    /// Create a successful API response with default 200 status
    pub fn success() -> Self {
        Self::with_status(StatusCode::OK)
    }

    /// Create a 201 Created response
    pub fn created() -> Self {
        Self::with_status(StatusCode::CREATED)
    }

    /// Create a 204 No Content response (body is never sent)
    pub fn no_content() -> Self {
        Self::with_status(StatusCode::NO_CONTENT)
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.get_or_insert_with(Map::new).insert(key.to_string(), value);
        self
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.fields.insert("results".to_string(), Value::from(results));
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.fields.insert("token".to_string(), Value::String(token));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.fields.insert("message".to_string(), Value::String(message.into()));
        self
    }

    pub fn with_cookie(mut self, cookie: String) -> Self {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                self.headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Dropping malformed cookie header: {}", e),
        }
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        // For 204 No Content, return empty response
        if self.status_code == StatusCode::NO_CONTENT {
            return (self.status_code, self.headers).into_response();
        }

        let mut envelope = self.fields;
        envelope.insert("status".to_string(), Value::from("success"));
        if let Some(data) = self.data {
            envelope.insert("data".to_string(), Value::Object(data));
        }

        (self.status_code, self.headers, Json(Value::Object(envelope))).into_response()
    }
}

// Convenience type alias
pub type ApiResult = Result<ApiResponse, AppError>;
