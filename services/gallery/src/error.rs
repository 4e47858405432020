//! Error types for the gallery service
//!
//! `StoreError` is what the store adapters report. `ServiceError` is the
//! taxonomy the controller and the HTTP layer speak; it renders itself as
//! `{"message": ..., "error": true}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::jwt::TokenError;

/// Error reported by a store adapter
#[derive(Error, Debug)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint was violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Relational store failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object store failure
    #[error("object store error: {0}")]
    ObjectStore(String),
}

/// Error returned by controller operations
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Entity absent
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Credential mismatch
    #[error("invalid login or password")]
    Unauthenticated,

    /// Authenticated but not allowed to touch the target resource
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed, expired or unverifiable token
    #[error(transparent)]
    InvalidToken(TokenError),

    /// Malformed request input
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Opaque failure from one of the stores
    #[error("{op} failed: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    /// Server-side failure unrelated to the stores
    #[error("internal error: {0}")]
    Internal(String),

    /// The execution context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// The execution context deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ServiceError {
    /// Wrap a store error that has no more specific meaning for `op`
    pub fn storage(op: &'static str, source: StoreError) -> Self {
        match source {
            StoreError::Conflict(message) => ServiceError::Conflict(message),
            source => ServiceError::Storage { op, source },
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthenticated | ServiceError::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage { .. } | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) | TokenError::Lifetime => ServiceError::Internal(err.to_string()),
            err => ServiceError::InvalidToken(err),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServiceError::Storage { op, .. } => {
                error!("{}", self);
                format!("{} failed", op)
            }
            ServiceError::Internal(_) => {
                error!("{}", self);
                "internal error".to_string()
            }
            _ => self.to_string(),
        };

        error_response(status, message)
    }
}

/// Render the JSON error body shared by every failing response
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(json!({
        "message": message.into(),
        "error": true,
    }));

    (status, body).into_response()
}

/// Type alias for controller results
pub type ServiceResult<T> = Result<T, ServiceError>;
