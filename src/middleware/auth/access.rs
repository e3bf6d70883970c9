//! Bearer authentication → `Identity` in request extensions.
//!
//! Exactly one log entry per request: an `audit` info line on success, a warn
//! (error for 5xx) line on failure. The revocation-check outcome rides on that
//! same line.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::{ApiError, UNKNOWN_CORRELATION_ID};
use crate::middleware::correlation::CorrelationId;
use crate::state::AppState;

/// Require authentication on every route of `router`.
///
/// Uses `route_layer` so unmatched paths still fall through to the 404 fallback.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let correlation_id = req.extensions().get::<CorrelationId>().cloned();
    let cid = correlation_id
        .as_ref()
        .map(CorrelationId::as_str)
        .unwrap_or(UNKNOWN_CORRELATION_ID);

    let outcome = state
        .auth
        .authenticate(req.headers().get(header::AUTHORIZATION))
        .await;

    match outcome.result {
        Ok(identity) => {
            tracing::info!(
                target: "audit",
                user_id = %identity.subject,
                role = identity.role_or_empty(),
                correlation_id = cid,
                revocation = outcome.revocation.as_str(),
                revocation_error = outcome.revocation_error.as_deref(),
                "authentication successful"
            );
            req.extensions_mut().insert(identity);
            Ok(next.run(req).await)
        }
        Err(err) => {
            if err.status().is_server_error() {
                tracing::error!(
                    target: "audit",
                    error_kind = err.kind(),
                    error = %err,
                    correlation_id = cid,
                    revocation = outcome.revocation.as_str(),
                    revocation_error = outcome.revocation_error.as_deref(),
                    "authentication failed"
                );
            } else {
                tracing::warn!(
                    target: "audit",
                    error_kind = err.kind(),
                    correlation_id = cid,
                    revocation = outcome.revocation.as_str(),
                    revocation_error = outcome.revocation_error.as_deref(),
                    "authentication failed"
                );
            }
            Err(err
                .at(correlation_id.as_ref())
                .verbose(state.expose_details))
        }
    }
}
