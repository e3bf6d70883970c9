use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::UNKNOWN_CORRELATION_ID;
use crate::middleware::correlation::CorrelationId;

/// Handler-side access to the request's correlation id.
///
/// `correlation::apply` inserts it for every request; the placeholder only
/// shows up if a handler is mounted outside that layer.
#[derive(Debug, Clone)]
pub struct RequestCorrelation(pub CorrelationId);

impl<S> FromRequestParts<S> for RequestCorrelation
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<CorrelationId>()
                .cloned()
                .unwrap_or_else(|| CorrelationId::from_trusted(UNKNOWN_CORRELATION_ID)),
        ))
    }
}
