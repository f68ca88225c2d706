// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::sync::Arc;

use crate::config::Environment;
use crate::database::models::ValidationErrors;
use crate::database::StoreError;
use crate::filter::error::FilterError;
use crate::mail::MailError;

/// Message sent for unexpected failures outside development
pub const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// What produced the error. Library-originated kinds are reclassified into
/// client-facing messages before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    App,
    InvalidToken,
    TokenExpired,
    Cast { path: String, value: String },
    DuplicateKey { field: String, value: String },
    Validation { fields: Vec<(String, String)> },
    Internal,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::App => "AppError",
            ErrorKind::InvalidToken => "JsonWebTokenError",
            ErrorKind::TokenExpired => "TokenExpiredError",
            ErrorKind::Cast { .. } => "CastError",
            ErrorKind::DuplicateKey { .. } => "DuplicateKeyError",
            ErrorKind::Validation { .. } => "ValidationError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

/// Error value carried from handlers to the normalization layer
#[derive(Debug)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    status_code: StatusCode,
    operational: bool,
    source: Option<anyhow::Error>,
    stack: Backtrace,
}

impl AppError {
    /// Operational error raised by a handler
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::App,
            message: message.into(),
            status_code,
            operational: true,
            source: None,
            stack: Backtrace::capture(),
        }
    }

    fn library(kind: ErrorKind, message: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            operational: false,
            source,
            stack: Backtrace::capture(),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Status code after reclassification
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidToken | ErrorKind::TokenExpired => StatusCode::UNAUTHORIZED,
            ErrorKind::Cast { .. } | ErrorKind::DuplicateKey { .. } | ErrorKind::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::App | ErrorKind::Internal => self.status_code,
        }
    }

    /// Client-facing message after reclassification
    pub fn message(&self) -> Cow<'_, str> {
        match &self.kind {
            ErrorKind::InvalidToken => Cow::Borrowed("Invalid token. Please log in again!"),
            ErrorKind::TokenExpired => Cow::Borrowed("Your token has expired! Please log in again."),
            ErrorKind::Cast { path, value } => Cow::Owned(format!("Invalid {}: {}", path, value)),
            ErrorKind::DuplicateKey { field, value } => Cow::Owned(format!(
                "Duplicate field value '{}' in field '{}'. Please use another value!",
                value, field
            )),
            ErrorKind::Validation { .. } | ErrorKind::App | ErrorKind::Internal => {
                Cow::Borrowed(self.message.as_str())
            }
        }
    }

    pub fn is_operational(&self) -> bool {
        match self.kind {
            ErrorKind::App => self.operational,
            ErrorKind::Internal => false,
            _ => true,
        }
    }

    /// `"fail"` for client errors, `"error"` otherwise
    pub fn status(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// Render the status and JSON body for the given environment
    pub fn render(&self, environment: Environment) -> (StatusCode, Value) {
        let status_code = self.status_code();

        if !environment.is_production_like() {
            let mut error = Map::new();
            error.insert("kind".to_string(), json!(self.kind.name()));
            error.insert("statusCode".to_string(), json!(status_code.as_u16()));
            error.insert("isOperational".to_string(), json!(self.is_operational()));
            if let ErrorKind::Validation { fields } = &self.kind {
                let fields: Map<String, Value> = fields
                    .iter()
                    .map(|(field, message)| (field.clone(), json!(message)))
                    .collect();
                error.insert("fields".to_string(), Value::Object(fields));
            }
            if let Some(source) = &self.source {
                error.insert("cause".to_string(), json!(format!("{:#}", source)));
            } else if self.kind != ErrorKind::App {
                error.insert("cause".to_string(), json!(self.message));
            }

            return (
                status_code,
                json!({
                    "status": self.status(),
                    "message": self.message(),
                    "error": error,
                    "stack": self.stack.to_string(),
                }),
            );
        }

        if self.is_operational() {
            return (
                status_code,
                json!({
                    "status": self.status(),
                    "message": self.message(),
                }),
            );
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "status": "error",
                "message": GENERIC_MESSAGE,
            }),
        )
    }

    /// Record an unexpected failure with its cause chain
    pub fn log(&self) {
        tracing::error!(
            kind = self.kind.name(),
            cause = ?self.source,
            "unexpected error: {}",
            self.message
        );
    }
}

// Static constructor methods
impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Operational 500; the message is shown to clients
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::library(ErrorKind::InvalidToken, message, None)
    }

    pub fn token_expired() -> Self {
        Self::library(ErrorKind::TokenExpired, "jwt expired", None)
    }

    pub fn cast(path: impl Into<String>, value: impl Into<String>) -> Self {
        let (path, value) = (path.into(), value.into());
        let message = format!("Cast failed for value \"{}\" at path \"{}\"", value, path);
        Self::library(ErrorKind::Cast { path, value }, message, None)
    }

    pub fn duplicate_key(field: impl Into<String>, value: impl Into<String>) -> Self {
        let (field, value) = (field.into(), value.into());
        let message = format!("E11000 duplicate key error: {} \"{}\"", field, value);
        Self::library(ErrorKind::DuplicateKey { field, value }, message, None)
    }

    /// Programming or infrastructure failure; never shown to production clients
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        let err = err.into();
        Self::library(ErrorKind::Internal, err.to_string(), Some(err))
    }
}

// Convert other error types to AppError
impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let message = err.to_string();
        Self::library(
            ErrorKind::Validation {
                fields: err.into_fields(),
            },
            message,
            None,
        )
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { field, value } => AppError::duplicate_key(field, value),
            other => AppError::unexpected(other),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token(err.to_string()),
        }
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::unexpected(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::unexpected(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::unexpected(err)
    }
}

// Standard error trait implementations
impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|err| &**err as &(dyn std::error::Error + 'static))
    }
}

// Handlers only build the production-safe response; the normalization
// middleware re-renders it from the attached error for the active environment.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.render(Environment::Production);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(Arc::new(self));
        response
    }
}
