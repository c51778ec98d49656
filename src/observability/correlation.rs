//! Request correlation identifiers.
//!
//! Every inbound request gets an opaque trace id at ingress: reused from an
//! upstream `X-Trace-Id` header when one is present and well-formed,
//! generated otherwise. The id lives in the request extensions for the
//! request's lifetime and is echoed on the response header so clients can
//! correlate their own records with server logs and spans.

use std::fmt;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the correlation id in both directions.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

const MAX_INBOUND_ID_LEN: usize = 128;

/// Opaque identifier linking all logs and spans belonging to one request.
///
/// Immutable once assigned; used only for correlation, never authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random id (UUID v4, 128 bits of entropy).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept an upstream-provided id if it is printable ASCII of sane length.
    pub fn from_inbound(raw: &str) -> Option<Self> {
        let ok = !raw.is_empty()
            && raw.len() <= MAX_INBOUND_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_graphic());
        ok.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Middleware assigning the correlation id.
///
/// Always succeeds: extraction failure falls back to generation. The id is
/// inserted into the request extensions before the inner service runs and
/// stamped on the response header afterwards, including error responses.
pub async fn correlation_middleware(mut request: Request<Body>, next: Next) -> Response {
    let id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(CorrelationId::from_inbound)
        .unwrap_or_else(CorrelationId::generate);

    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}
