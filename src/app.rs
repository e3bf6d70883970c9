/*
 * Responsibility
 * - Load config → build dependencies → assemble the Router
 * - Apply cross-cutting middleware in a fixed order
 * - axum::serve() with connect info + graceful shutdown
 */
use std::net::SocketAddr;
use std::panic;

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::auth::build_authenticator;
use crate::services::proxy::Dispatcher;
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,fintech_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics through tracing; CatchPanicLayer turns handler panics into 500s.
        tracing::error!(%info, "panic");
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    init_panic_hook();

    let config = Config::from_env().context("loading configuration")?;

    tracing::info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );
    for target in &config.services {
        tracing::info!(
            service = %target.service,
            target = %target.base_url,
            configured = target.configured,
            roles = ?target.required_roles,
            permission = target.required_permission.as_deref(),
            "route target"
        );
    }

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // AppState (and the revocation store connection it owns) is dropped with the server.
    tracing::info!("gateway stopped");
    Ok(())
}

pub async fn build_state(config: &Config) -> Result<AppState> {
    let auth = build_authenticator(config)
        .await
        .context("configuring the revocation store")?;
    let dispatcher = Dispatcher::new().context("building downstream http client")?;
    Ok(AppState::new(config, auth, dispatcher))
}

/// Full gateway router with every middleware layer applied.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let limiter = state.rate_limiter.clone();
    let expose_details = state.expose_details;

    let router = api::routes(&state).with_state(state);

    // Innermost first; each call wraps everything above it.
    let router = middleware::rate_limit::apply(router, limiter);
    let router = middleware::http::apply(router);
    let router = middleware::error_responder::apply(router, expose_details);
    let router = middleware::correlation::apply(router, &config.correlation_prefix);
    let router = middleware::security_headers::apply(router);
    middleware::cors::apply(router, config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
