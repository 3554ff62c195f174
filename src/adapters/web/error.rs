//! HTTP error responses for the API adapter.
//!
//! Every error renders as `{"detail": "..."}`. Server-side failures carry a
//! generic message; the cause is logged instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::PatternIqError;

const INTERNAL_DETAIL: &str = "internal server error";

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_DETAIL)
    }
}

pub fn status_from_error(err: &PatternIqError) -> StatusCode {
    match err {
        PatternIqError::StrategyParse { .. } | PatternIqError::PredicateParse(_) => {
            StatusCode::BAD_REQUEST
        }
        PatternIqError::NoData { .. } => StatusCode::NOT_FOUND,
        PatternIqError::InvalidRequest { .. } | PatternIqError::InsufficientData { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PatternIqError::Service { .. } => StatusCode::BAD_GATEWAY,
        PatternIqError::SimulationInvariant { .. }
        | PatternIqError::ConfigParse { .. }
        | PatternIqError::ConfigMissing { .. }
        | PatternIqError::ConfigInvalid { .. }
        | PatternIqError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PatternIqError> for WebError {
    fn from(err: PatternIqError) -> Self {
        let status = status_from_error(&err);
        if err.is_client_error() {
            tracing::debug!(error = %err, status = status.as_u16(), "backtest request rejected");
        } else {
            tracing::error!(error = %err, status = status.as_u16(), "backtest request failed");
        }
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => Self::internal(),
            StatusCode::BAD_GATEWAY => Self::new(status, "upstream service unavailable"),
            _ => Self::new(status, err.to_string()),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.message }))).into_response()
    }
}
