/*
 * Responsibility
 * - Gateway middleware, applied in app::build_router (outermost first):
 *   cors → security_headers → correlation → error_responder → http → rate_limit
 * - Per-route: auth::access (authentication) → auth::authorize (policy)
 */
pub mod auth;
pub mod client_ip;
pub mod correlation;
pub mod cors;
pub mod error_responder;
pub mod http;
pub mod rate_limit;
pub mod security_headers;
