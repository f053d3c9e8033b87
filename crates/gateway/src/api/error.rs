//! Shared HTTP error type: every handler returns `Result<T, ApiError>`, and
//! `ApiError` renders itself as a JSON body with the matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use beto_domain::error::Error as DomainError;

use crate::runtime::turn::TurnError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match &e {
            DomainError::Auth(_) => StatusCode::UNAUTHORIZED,
            DomainError::Config(_) => StatusCode::BAD_REQUEST,
            DomainError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: e.to_string() }
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        let status = match &e {
            TurnError::UnknownSession(_) => StatusCode::NOT_FOUND,
            TurnError::Cancelled => StatusCode::CONFLICT,
            TurnError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            TurnError::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: e.to_string() }
    }
}
