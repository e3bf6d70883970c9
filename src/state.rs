/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - authenticator (+ its optional revocation store), route table, dispatcher, throttle
 * - Built once at startup; Clone is cheap (Arc inside)
 */
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::auth::Authenticator;
use crate::services::proxy::{Dispatcher, RouteTable, ServiceName};

/// Readiness entry for one downstream service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceStatus {
    pub service: ServiceName,
    pub configured: bool,
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub routes: Arc<RouteTable>,
    pub dispatcher: Dispatcher,
    pub rate_limiter: RateLimiter,
    pub services: Arc<[ServiceStatus]>,
    pub expose_details: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &Config, auth: Arc<Authenticator>, dispatcher: Dispatcher) -> Self {
        let services = config
            .services
            .iter()
            .map(|t| ServiceStatus {
                service: t.service,
                configured: t.configured,
            })
            .collect::<Vec<_>>()
            .into();

        Self {
            auth,
            routes: Arc::new(RouteTable::from_config(config)),
            dispatcher,
            rate_limiter: RateLimiter::new(&config.rate_limit),
            services,
            expose_details: !config.app_env.is_production(),
            started_at: Instant::now(),
        }
    }
}
