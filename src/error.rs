use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid criteria: {0}")]
    Criteria(#[from] CriteriaError),

    #[error("Channel send error: {0}")]
    ChannelSend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Criteria(_) => StatusCode::BAD_REQUEST,
            AppError::ChannelSend(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Failure of a single marketplace call. Never fatal: the scheduler keeps ticking.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("marketplace unreachable: {0}")]
    Network(String),

    #[error("marketplace did not answer within {0:?}")]
    Timeout(Duration),

    #[error("marketplace returned HTTP {0}")]
    Http(u16),

    #[error("unreadable marketplace response: {0}")]
    Decode(String),
}

/// Why a single raw listing could not become an `AdRecord`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("listing has no advertisement block")]
    MissingAdv,

    #[error("required field `{0}` is absent")]
    MissingField(&'static str),

    #[error("field `{field}` is not numeric: {value}")]
    Malformed { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CriteriaError {
    #[error("amount_min ({min}) is greater than amount_max ({max})")]
    InvertedAmountRange { min: f64, max: f64 },

    #[error("{0} must be a finite, non-negative number")]
    InvalidAmount(&'static str),

    #[error("rows must be between 1 and {max}, got {got}")]
    RowsOutOfRange { got: u32, max: u32 },

    #[error("{0} must not be empty")]
    Blank(&'static str),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification backend unavailable: {0}")]
    Backend(#[from] std::io::Error),
}
