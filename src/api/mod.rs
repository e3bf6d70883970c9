/*
 * Responsibility
 * - Public surface of the gateway: health checks, proxied service routes, 404 fallback
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
