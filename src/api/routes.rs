/*
 * Responsibility
 * - Gateway URL structure
 * - /health endpoints without auth
 * - One route group per route-table entry: authenticate → authorize (per service) → forward
 */
use axum::{
    Router,
    routing::{any, get},
};

use crate::api::handlers::{fallback::not_found, health, proxy::forward};
use crate::middleware::auth::{access, authorize};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .merge(proxied(state))
        .fallback(not_found)
}

fn proxied(state: &AppState) -> Router<AppState> {
    let mut router = Router::new();

    for entry in state.routes.entries() {
        let group = Router::new()
            .route(entry.prefix, any(forward))
            .route(&format!("{}/", entry.prefix), any(forward))
            .route(&format!("{}/{{*rest}}", entry.prefix), any(forward));
        let group = authorize::apply(
            group,
            entry.target.service,
            entry.target.policy.clone(),
        );
        router = router.merge(group);
    }

    // Added last so it wraps the authorize layers.
    access::apply(router, state.clone())
}
