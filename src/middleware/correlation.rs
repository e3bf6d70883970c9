//! Correlation id assignment.
//!
//! The id is taken from the inbound `X-Correlation-ID` header when it is
//! present, visible text and non-blank, otherwise generated as `<prefix>-<unix millis>-<random>`. It is
//! stored in request extensions for every later stage and echoed back on the
//! response.

use std::fmt;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

const RANDOM_LEN: usize = 9;

/// Per-request correlation id. Written once at request entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    pub fn generate(prefix: &str) -> Self {
        let random: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(RANDOM_LEN)
            .collect();
        Self(format!("{prefix}-{}-{random}", Utc::now().timestamp_millis()).into())
    }

    /// Client-supplied id, kept as sent. Opaque (non-visible-ASCII) or blank values are ignored.
    pub fn from_inbound(value: &HeaderValue) -> Option<Self> {
        let raw = value.to_str().ok()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(Self(raw.into()))
    }

    pub fn from_trusted(raw: &str) -> Self {
        Self(raw.into())
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

#[derive(Debug, Clone)]
struct CorrelationConfig {
    prefix: Arc<str>,
}

pub fn apply(router: Router, prefix: &str) -> Router {
    let config = CorrelationConfig {
        prefix: prefix.into(),
    };
    router.layer(middleware::from_fn_with_state(config, assign))
}

async fn assign(
    State(config): State<CorrelationConfig>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let correlation_id = req
        .headers()
        .get(&CORRELATION_HEADER)
        .and_then(CorrelationId::from_inbound)
        .unwrap_or_else(|| CorrelationId::generate(&config.prefix));

    req.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}
