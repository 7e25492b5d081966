//! # API Errors
//!
//! Every failure is rendered as `{"detail": "..."}` with a matching status.

use alm_core::AlmError;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// An HTTP error with a client-facing detail message.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.detail)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}

impl From<AlmError> for ApiError {
    fn from(err: AlmError) -> Self {
        match err {
            AlmError::NotFound(msg) | AlmError::InsufficientData(msg) => Self::not_found(msg),
            AlmError::InvalidInput(msg) => Self::unprocessable(msg),
            AlmError::Conflict(msg) => Self::bad_request(msg),
            AlmError::Unauthorized(msg) => Self::unauthorized(msg),
            other => {
                tracing::error!(error = %other, "Internal error");
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_statuses() {
        let cases = [
            (AlmError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AlmError::InvalidInput("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AlmError::Conflict("x".into()), StatusCode::BAD_REQUEST),
            (AlmError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AlmError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn invalid_input_keeps_detail() {
        let err = ApiError::from(AlmError::InvalidInput("allocation 2 outside [0, 1]".into()));
        assert_eq!(err.detail, "allocation 2 outside [0, 1]");
    }
}
