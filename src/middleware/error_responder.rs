//! Terminal error normalization.
//!
//! Components turn their own known failures into envelopes at the point of
//! detection. Anything else that reaches this layer as a bare 4xx/5xx (body
//! limit rejections, extractor rejections, caught panics, 405s) is rewritten
//! into an `ErrorEnvelope` by status family. Envelopes and proxied downstream
//! responses carry the `Finalized` marker and are left untouched.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};

use crate::error::{AppError, Finalized, UNKNOWN_CORRELATION_ID};
use crate::middleware::correlation::CorrelationId;

/// Panic payload recorded by the catch-panic layer for the responder to pick up.
#[derive(Debug, Clone)]
pub struct PanicDetail(pub String);

#[derive(Debug, Clone, Copy)]
struct ResponderMode {
    expose_details: bool,
}

pub fn apply(router: Router, expose_details: bool) -> Router {
    router.layer(middleware::from_fn_with_state(
        ResponderMode { expose_details },
        normalize,
    ))
}

async fn normalize(State(mode): State<ResponderMode>, req: Request<Body>, next: Next) -> Response {
    let correlation_id = req.extensions().get::<CorrelationId>().cloned();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error())
        || response.extensions().get::<Finalized>().is_some()
    {
        return response;
    }

    let panic_detail = response.extensions().get::<PanicDetail>().cloned();
    let error = classify(status, panic_detail);

    let cid = correlation_id
        .as_ref()
        .map(CorrelationId::as_str)
        .unwrap_or(UNKNOWN_CORRELATION_ID);
    if status.is_server_error() {
        tracing::error!(
            correlation_id = cid,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            error = %error,
            "unhandled error"
        );
    } else {
        tracing::warn!(
            correlation_id = cid,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            error_kind = error.kind(),
            "request rejected"
        );
    }

    error
        .at(correlation_id.as_ref())
        .verbose(mode.expose_details)
        .with_status(status)
        .into_response()
}

fn classify(status: StatusCode, panic: Option<PanicDetail>) -> AppError {
    let reason = status.canonical_reason().unwrap_or("Error");
    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthenticated,
        StatusCode::FORBIDDEN => AppError::InsufficientRole,
        StatusCode::NOT_FOUND => AppError::NotFound,
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited,
        StatusCode::PAYLOAD_TOO_LARGE => AppError::validation("Request body too large"),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            AppError::DownstreamUnavailable {
                service: None,
                reason: reason.to_string(),
            }
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            AppError::DownstreamTimeout { service: None }
        }
        s if s.is_client_error() => AppError::validation(reason),
        _ => AppError::unclassified(
            panic
                .map(|p| p.0)
                .unwrap_or_else(|| reason.to_string()),
        ),
    }
}
