//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Access logging / request tracing (TraceLayer), one span per request tagged
//!   with the correlation id
//! - Panic containment (CatchPanicLayer)
//! - Body size limits
//!
//! Must be applied inside `correlation::apply` so the span can see the id.

use std::any::Any;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::middleware::correlation::CorrelationId;
use crate::middleware::error_responder::PanicDetail;

pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Apply HTTP-level middleware to the given Router.
///
/// Defaults:
/// - Body limit: 10 MiB
pub fn apply(router: Router) -> Router {
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES));

    router.layer(layers)
}

fn request_span(req: &Request<Body>) -> Span {
    let correlation_id = req
        .extensions()
        .get::<CorrelationId>()
        .map(|c| c.as_str().to_owned())
        .unwrap_or_default();

    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        correlation_id = %correlation_id,
    )
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(PanicDetail(detail));
    response
}
