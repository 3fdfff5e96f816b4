use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use bitbadge_core::error::ApiError;
use bitbadge_core::CoreError;

// ==============================================================================
// Error Type
// ==============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Parse(_)
            | CoreError::Clarity(_)
            | CoreError::InvalidProof(_)
            | CoreError::InvalidConfig(_)
            | CoreError::SenderMismatch(_) => Self::BadRequest(message),
            CoreError::MissingSession(_) | CoreError::NotConfirmed(_) => Self::Conflict(message),
            CoreError::Explorer(ApiError::Status { status: 404, .. }) => Self::NotFound(message),
            CoreError::Explorer(_) | CoreError::Node(_) | CoreError::ReadOnlyRejected(_) => {
                Self::BadGateway(message)
            }
            CoreError::Store(_) | CoreError::Io(_) => {
                tracing::error!(error = %message, "session store failure");
                Self::Internal(message)
            }
        }
    }
}
