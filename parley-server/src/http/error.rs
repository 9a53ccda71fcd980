use axum::{http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::problem::ProblemDetails;
use crate::services::messages::MessagesError;
use crate::services::rooms::RoomsError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, ApiError>;

/// API-level error carrying the status code and machine-readable code the
/// response should use.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let details = self.details;

        let mut problem = ProblemDetails::new(self.status, self.code, self.message);
        if let Some(details) = details {
            problem = problem.with_details(details);
        }

        problem.into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal_server_error(value.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err
                .code()
                .unwrap_or_else(|| std::borrow::Cow::Borrowed("unknown"));
            let message = format!("database error {code}");
            return Self::internal_server_error(message)
                .with_details(json!({ "sqlstate": code, "message": db_err.message() }));
        }

        Self::internal_server_error(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => Self::bad_request("username already exists"),
            StoreError::Database(db_err) => Self::from(db_err),
        }
    }
}

impl From<RoomsError> for ApiError {
    fn from(err: RoomsError) -> Self {
        match err {
            RoomsError::NotFound => Self::not_found(err.to_string()),
            RoomsError::NotParticipant | RoomsError::Forbidden => Self::forbidden(err.to_string()),
            RoomsError::Validation(message) => Self::bad_request(message),
            RoomsError::Store(store_err) => Self::from(store_err),
        }
    }
}

impl From<MessagesError> for ApiError {
    fn from(err: MessagesError) -> Self {
        match err {
            MessagesError::NotFound => Self::not_found(err.to_string()),
            MessagesError::Rooms(rooms_err) => Self::from(rooms_err),
            MessagesError::Store(store_err) => Self::from(store_err),
        }
    }
}
