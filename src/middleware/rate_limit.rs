//! Fixed-window request throttle keyed by client IP.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::middleware::client_ip::client_ip;
use crate::middleware::correlation::CorrelationId;

// Purge expired windows once the map grows past this many clients,
// at most once per window.
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
struct Windows {
    clients: HashMap<String, Window>,
    last_purge: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    limit: u32,
    inner: Arc<Mutex<Windows>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: config.window,
            limit: config.max_requests,
            inner: Arc::new(Mutex::new(Windows::default())),
        }
    }

    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    async fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut state = self.inner.lock().await;
        let window = self.window;

        let purge_due = state
            .last_purge
            .is_none_or(|at| now.duration_since(at) >= window);
        if state.clients.len() >= PURGE_THRESHOLD && purge_due {
            state
                .clients
                .retain(|_, w| now.duration_since(w.started) < window);
            state.last_purge = Some(now);
        }

        let entry = state.clients.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count < self.limit {
            entry.count += 1;
            true
        } else {
            false
        }
    }
}

pub fn apply(router: Router, limiter: RateLimiter) -> Router {
    router.layer(middleware::from_fn_with_state(limiter, throttle))
}

async fn throttle(State(limiter): State<RateLimiter>, req: Request<Body>, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let key = client_ip(&parts).unwrap_or_else(|| "unknown".to_string());

    if !limiter.allow(&key).await {
        let correlation_id = parts.extensions.get::<CorrelationId>();
        tracing::warn!(
            client_ip = %key,
            correlation_id = correlation_id.map(CorrelationId::as_str).unwrap_or_default(),
            "rate limit exceeded"
        );
        return AppError::RateLimited.at(correlation_id).into_response();
    }

    next.run(Request::from_parts(parts, body)).await
}
