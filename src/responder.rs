use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::SystemTime;

pub const DEFAULT_BLOCKED_MESSAGE: &str =
    "you have reached the maximum number of requests or actions allowed within a certain time frame";

/// A request the admission logic decided to reject.
#[derive(Debug, Clone)]
pub struct BlockedRequest {
    /// Scope key the request was counted under (address or token).
    pub identifier: String,
    pub blocked_until: SystemTime,
}

impl BlockedRequest {
    pub fn new(identifier: impl Into<String>, blocked_until: SystemTime) -> Self {
        Self {
            identifier: identifier.into(),
            blocked_until,
        }
    }

    /// Whole seconds until the block ends, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let remaining = self
            .blocked_until
            .duration_since(SystemTime::now())
            .unwrap_or_default();
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }
}

/// Writes the answer for a blocked request.
pub trait Responder: Send + Sync {
    fn respond(&self, request: &BlockedRequest) -> Response;
}

/// Which responder a resolved configuration ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    Default,
    Custom,
}

impl std::fmt::Display for ResponderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponderKind::Default => write!(f, "Default"),
            ResponderKind::Custom => write!(f, "Custom"),
        }
    }
}

/// `429 Too Many Requests` with a `Retry-After` header and a plain text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponder;

impl Responder for DefaultResponder {
    fn respond(&self, request: &BlockedRequest) -> Response {
        let mut response = (StatusCode::TOO_MANY_REQUESTS, DEFAULT_BLOCKED_MESSAGE).into_response();
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(request.retry_after_secs()),
        );
        response
    }
}
