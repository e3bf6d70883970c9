/*
 * Responsibility
 * - GET /health, /health/ready, /health/live
 * - Unauthenticated; still throttled and correlated like every other route
 */
use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::api::extractors::RequestCorrelation;
use crate::state::AppState;

pub const SERVICE_NAME: &str = "fintech-api-gateway";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub uptime: f64,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceReadiness {
    pub name: &'static str,
    pub configured: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    pub status: &'static str,
    pub services: Vec<ServiceReadiness>,
    pub revocation_check: bool,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub correlation_id: String,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn health(
    State(state): State<AppState>,
    RequestCorrelation(correlation_id): RequestCorrelation,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: now_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs_f64(),
        correlation_id: correlation_id.to_string(),
    })
}

pub async fn ready(
    State(state): State<AppState>,
    RequestCorrelation(correlation_id): RequestCorrelation,
) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready",
        services: state
            .services
            .iter()
            .map(|s| ServiceReadiness {
                name: s.service.deployment_name(),
                configured: s.configured,
            })
            .collect(),
        revocation_check: state.auth.revocation_enabled(),
        correlation_id: correlation_id.to_string(),
    })
}

pub async fn live(RequestCorrelation(correlation_id): RequestCorrelation) -> Json<LiveResponse> {
    Json(LiveResponse {
        status: "alive",
        timestamp: now_rfc3339(),
        correlation_id: correlation_id.to_string(),
    })
}
