use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The entity exists but its current state forbids the operation.
    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Forbidden(String),

    /// The write would break a hierarchy or quota invariant.
    #[error("{0}")]
    Integrity(String),

    /// Activation request does not match the key's software.
    #[error("{0}")]
    Mismatch(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Too many failed attempts, locked for {minutes} minute(s)")]
    TooManyRequests { minutes: i64 },

    /// Transaction could not begin or commit. Safe for the client to retry.
    #[error("Store temporarily unavailable: {0}")]
    TransientStore(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Mismatch(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Integrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::TransientStore(_) | AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, independent of the message text.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Integrity(_) => "INTEGRITY_VIOLATION",
            AppError::Mismatch(_) => "MISMATCH",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            AppError::TransientStore(_) | AppError::Pool(_) => "TRANSIENT_STORE_ERROR",
            AppError::Database(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                AppError::TransientStore(err.to_string())
            }
            _ => AppError::Database(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    minutes: Option<i64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't leak storage details to clients
        let error = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let minutes = match &self {
            AppError::TooManyRequests { minutes } => Some(*minutes),
            _ => None,
        };

        let body = ErrorBody {
            error,
            code: self.code(),
            minutes,
        };

        (status, Json(body)).into_response()
    }
}

/// True if the error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
