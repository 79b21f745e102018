//! Error types for songbook-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use songbook_common::Envelope;
use thiserror::Error;
use tracing::error;

/// API error type
///
/// Every variant renders as a failed envelope `{ success: false, message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request or failed validation (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured size limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<songbook_common::Error> for ApiError {
    fn from(err: songbook_common::Error) -> Self {
        match err {
            songbook_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            songbook_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            songbook_common::Error::Io(e) => ApiError::Io(e),
            songbook_common::Error::Config(msg) => ApiError::Internal(msg),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) | ApiError::Database(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(self) -> String {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg) => msg,
            ApiError::Database(e) => e.to_string(),
            ApiError::Io(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(Envelope::<()>::failure(self.message()));
        (status, body).into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;
