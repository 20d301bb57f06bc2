//! API error types

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kameo::error::SendError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use minefleet_core::CoreError;

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Error message
    pub message: String,
}

impl ApiError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }
}

/// Wrapper for API errors with status codes
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: ApiError::internal(message),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::not_found(message),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AddressNotFound(_) => Self::not_found(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl<M> From<SendError<M, CoreError>> for AppError
where
    SendError<M, CoreError>: fmt::Display,
{
    fn from(err: SendError<M, CoreError>) -> Self {
        match err {
            SendError::HandlerError(e) => e.into(),
            other => Self::internal(format!("fleet actor unavailable: {other}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}
