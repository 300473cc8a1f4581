use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Client exceeded a request quota. `retry_after` is present when the
    /// window end is known (action-specific limits); the daily global limit
    /// reports none and tells the caller to come back tomorrow.
    #[error("rate limit exceeded for category '{category}'")]
    RateLimited {
        category: String,
        retry_after: Option<Duration>,
    },

    /// The requested slot overlaps an existing booking.
    #[error("time slot already booked")]
    SlotConflict,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The message shown to the end user. Denials must distinguish
    /// "pick another time" from "come back in N minutes" from
    /// "come back tomorrow".
    pub fn user_message(&self) -> String {
        match self {
            Error::RateLimited {
                retry_after: Some(wait),
                ..
            } => {
                let minutes = wait.as_millis().div_ceil(60_000);
                format!("Rate limit exceeded. Please try again in {} minutes.", minutes)
            }
            Error::RateLimited {
                retry_after: None, ..
            } => "Daily request limit reached. Please try again tomorrow.".to_string(),
            Error::SlotConflict => {
                "This time slot is already booked. Please select another time.".to_string()
            }
            Error::Validation(msg) => msg.clone(),
            Error::Storage(_) | Error::Config(_) | Error::Internal(_) => {
                "An internal error occurred. Please try again later.".to_string()
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::RateLimited { .. } => "rate_limit_exceeded",
            Error::SlotConflict => "slot_conflict",
            Error::Validation(_) => "validation_error",
            Error::Storage(_) => "storage_error",
            Error::Config(_) => "configuration_error",
            Error::Internal(_) => "internal_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::SlotConflict => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Storage(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_minutes: Option<u64>,
}

impl ErrorResponse {
    pub fn from_error(err: &Error) -> Self {
        let retry_after_minutes = match err {
            Error::RateLimited {
                retry_after: Some(wait),
                ..
            } => Some(wait.as_millis().div_ceil(60_000) as u64),
            _ => None,
        };

        Self {
            error: err.kind().to_string(),
            message: err.user_message(),
            code: err.status_code().as_u16(),
            retry_after_minutes,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if matches!(
            self,
            Error::Storage(_) | Error::Config(_) | Error::Internal(_)
        ) {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse::from_error(&self);
        (self.status_code(), Json(body)).into_response()
    }
}
