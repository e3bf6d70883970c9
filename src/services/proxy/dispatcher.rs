//! Outbound dispatch to downstream services.
//!
//! Single attempt per inbound request, bounded by a fixed ceiling that covers
//! both connect and the full round-trip. Downstream responses are passed
//! through unchanged; transport failures become `AppError` dispatch-family
//! errors.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    response::Response,
};

use super::route_table::RouteTarget;
use crate::error::{AppError, Finalized};
use crate::middleware::correlation::{CORRELATION_HEADER, CorrelationId};

pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const GATEWAY_SERVICE_HEADER: HeaderName = HeaderName::from_static("x-gateway-service");
pub const GATEWAY_SERVICE_NAME: &str = "fintech-api-gateway";
const FORWARDED_FOR_HEADER: HeaderName = HeaderName::from_static("x-forwarded-for");

// Connection-scoped headers (RFC 9110 §7.6.1) plus the ones the client recomputes.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// An inbound request, already resolved against the route table.
#[derive(Debug)]
pub struct OutboundRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: Option<String>,
    pub correlation_id: &'a CorrelationId,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(DISPATCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            // Redirects are the client's business, not the gateway's.
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub async fn dispatch(
        &self,
        target: &RouteTarget,
        request: OutboundRequest<'_>,
    ) -> Result<Response, AppError> {
        let service = target.service;
        let url = target.upstream_url(request.path, request.query);
        let correlation_id = request.correlation_id.as_str();

        tracing::info!(
            service = %service,
            method = %request.method,
            target = %target.base_url,
            path = request.path,
            correlation_id,
            "proxying request"
        );

        let headers = outbound_headers(
            request.headers,
            request.correlation_id,
            request.client_ip.as_deref(),
        );

        let upstream = self
            .client
            .request(request.method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| classify(target, &err, correlation_id))?;

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();
        let body = upstream
            .bytes()
            .await
            .map_err(|err| classify(target, &err, correlation_id))?;

        tracing::info!(
            service = %service,
            status = status.as_u16(),
            correlation_id,
            "downstream response"
        );

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        for (name, value) in upstream_headers.iter() {
            if !is_hop_by_hop(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
        response.extensions_mut().insert(Finalized);
        Ok(response)
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| h == name)
}

/// Inbound headers minus hop-by-hop and `Host`, plus the gateway's tracing headers.
fn outbound_headers(
    inbound: HeaderMap,
    correlation_id: &CorrelationId,
    client_ip: Option<&str>,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 3);
    for (name, value) in inbound.iter() {
        if name != header::HOST && !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        headers.insert(CORRELATION_HEADER, value);
    }
    if let Some(value) = client_ip.and_then(|ip| HeaderValue::from_str(ip).ok()) {
        headers.insert(FORWARDED_FOR_HEADER, value);
    }
    headers.insert(
        GATEWAY_SERVICE_HEADER,
        HeaderValue::from_static(GATEWAY_SERVICE_NAME),
    );
    headers
}

fn classify(target: &RouteTarget, err: &reqwest::Error, correlation_id: &str) -> AppError {
    let service = target.service;
    let error = if err.is_timeout() {
        AppError::DownstreamTimeout {
            service: Some(service.to_string()),
        }
    } else if err.is_connect() {
        AppError::DownstreamUnavailable {
            service: Some(service.to_string()),
            reason: err.to_string(),
        }
    } else {
        AppError::DownstreamUnavailable {
            service: None,
            reason: err.to_string(),
        }
    };

    tracing::error!(
        service = %service,
        error = %err,
        error_kind = error.kind(),
        correlation_id,
        "proxy error"
    );
    error
}
