//! API error taxonomy and response mapping.
//!
//! Only these variants may shape the HTTP response; every other failure is
//! absorbed inside its owning component. Clients always receive a JSON body
//! with an `error` field — internal exception detail never leaks.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Request-visible failure kinds, statically distinguishable at the call site.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing/empty input. 400, logged at WARN, never retried.
    #[error("{0}")]
    Validation(String),

    /// Over the fixed-window cap. 429 with a retry-after hint, logged at
    /// WARN; retrying is the client's responsibility.
    #[error("too many requests")]
    RateLimited { retry_after_secs: u64 },

    /// Downstream failure, detail suppressed. 500 with a generic body;
    /// the full error is logged at ERROR before mapping to this.
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(message) => json!({ "error": message }),
            ApiError::RateLimited { retry_after_secs } => json!({
                "error": "Too many requests, please try again later",
                "retryAfter": retry_after_secs,
            }),
            ApiError::Internal => json!({ "error": "Internal server error" }),
        };
        (status, Json(body)).into_response()
    }
}
