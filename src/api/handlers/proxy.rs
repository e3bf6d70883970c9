/*
 * Responsibility
 * - Catch-all handler for every route-table prefix
 * - Resolve → rewrite → dispatch; the downstream response is returned as-is
 */
use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::Request,
    response::Response,
};

use crate::api::extractors::RequestCorrelation;
use crate::error::{ApiError, AppError};
use crate::middleware::client_ip::client_ip;
use crate::middleware::http::BODY_LIMIT_BYTES;
use crate::services::proxy::OutboundRequest;
use crate::state::AppState;

pub async fn forward(
    State(state): State<AppState>,
    RequestCorrelation(correlation_id): RequestCorrelation,
    req: Request<Body>,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();

    // Registered routes come from the same table, so a miss here is a wiring bug.
    let Some(resolved) = state.routes.resolve(parts.uri.path()) else {
        return Err(AppError::NotFound.at(Some(&correlation_id)));
    };

    let body = to_bytes(body, BODY_LIMIT_BYTES).await.map_err(|err| {
        AppError::Validation {
            message: "Request body could not be read".into(),
            details: Some(err.to_string().into()),
        }
        .at(Some(&correlation_id))
        .verbose(state.expose_details)
    })?;

    let client_ip = client_ip(&parts);
    let outbound = OutboundRequest {
        method: parts.method,
        path: &resolved.rewritten_path,
        query: parts.uri.query(),
        headers: parts.headers,
        body,
        client_ip,
        correlation_id: &correlation_id,
    };

    state
        .dispatcher
        .dispatch(&resolved.entry.target, outbound)
        .await
        .map_err(|err| {
            err.at(Some(&correlation_id))
                .verbose(state.expose_details)
        })
}
