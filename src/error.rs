//! API error taxonomy for Medora.
//!
//! Every failure surfaced by a route handler is an [`ApiError`]; the
//! `IntoResponse` impl renders it as the JSON body `{message, error?}` with
//! the matching HTTP status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// A `Result` specialized to [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),
    /// No matching record (404).
    #[error("{0}")]
    NotFound(String),
    /// Credential or token verification failed (401).
    #[error("{0}")]
    InvalidCredential(String),
    /// The record exists but under a different role than claimed (403).
    #[error("Invalid user role. Expected {expected} but found {found}")]
    RoleMismatch { expected: String, found: String },
    /// A uniqueness rule was violated, e.g. bed double-booking (409).
    #[error("{0}")]
    Conflict(String),
    /// Unexpected persistence or internal failure (500).
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound("Record not found".to_string()),
            rusqlite::Error::SqliteFailure(e, ref msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ApiError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "Constraint violation".to_string()),
                )
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidCredential(_) => StatusCode::UNAUTHORIZED,
            ApiError::RoleMismatch { .. } => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ApiError::Internal(source) => {
                tracing::error!(error = %source, "request failed");
                json!({ "message": self.to_string(), "error": source.to_string() })
            }
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
