//! HTTP error types for the form builder server.
//!
//! Maps domain errors from `formbuild-core` into HTTP responses. Every
//! response carries a JSON body with a machine-readable `error` field and a
//! human-readable `message`. Internal failures are logged with their cause
//! and answered with a generic message only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use formbuild_core::error::{
    AccessError, FormIdError, RecorderError, RenderError, RepositoryError, ValidationError,
};

/// Message sent for every internal failure.
const INTERNAL_MESSAGE: &str = "Internal Server Error";

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Client sent a malformed or invalid request.
    BadRequest(String),
    /// Client key missing or not recognized.
    Forbidden(String),
    /// Requested form does not exist.
    NotFound(String),
    /// Server-side failure; the detail is logged, never returned.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Internal(detail) => {
                error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    INTERNAL_MESSAGE.to_owned(),
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

impl From<FormIdError> for AppError {
    fn from(err: FormIdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidId(ref inner) => inner.clone().into(),
            RepositoryError::NotFound { .. } => Self::NotFound(
                "Failed get form because the form not found or no longer exists".to_owned(),
            ),
            RepositoryError::IdExhausted { .. }
            | RepositoryError::Io { .. }
            | RepositoryError::Serialization(_)
            | RepositoryError::Corrupt { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<RecorderError> for AppError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::InvalidId(ref inner) => inner.clone().into(),
            RecorderError::EmptyAnswer => Self::BadRequest(err.to_string()),
            RecorderError::Io { .. } | RecorderError::Csv(_) | RecorderError::Task(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}
