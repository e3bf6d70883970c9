//! End-to-end tests for the gateway router.
//!
//! Requests go through the fully layered router via `oneshot`; downstream
//! services are real axum servers bound to an ephemeral localhost port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::any;
use axum::{Json, Router};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use fintech_gateway::app::build_router;
use fintech_gateway::config::Config;
use fintech_gateway::services::auth::{Authenticator, RevocationStore, TokenVerifier};
use fintech_gateway::services::cache::CacheError;
use fintech_gateway::services::proxy::Dispatcher;
use fintech_gateway::state::AppState;

const SECRET: &str = "integration-secret";

// -- Helpers ------------------------------------------------------------------

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

fn token(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn user_token(role: &str, permissions: &[&str]) -> String {
    token(json!({
        "sub": "user-42",
        "email": "user@example.com",
        "role": role,
        "permissions": permissions,
        "exp": now() + 3600,
    }))
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Echoes what the gateway forwarded.
async fn echo(req: axum::extract::Request) -> Json<Value> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": req.method().as_str(),
        "path": req.uri().path(),
        "query": req.uri().query(),
        "correlationId": header("x-correlation-id"),
        "gatewayService": header("x-gateway-service"),
        "authorization": header("authorization"),
        "host": header("host"),
    }))
}

async fn spawn_downstream() -> String {
    let app = Router::new()
        .route(
            "/missing",
            any(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "customer not found" })),
                )
            }),
        )
        .route(
            "/slow",
            any(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .fallback(echo);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// An address nothing listens on.
async fn closed_port() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

struct GatewayBuilder {
    vars: HashMap<String, String>,
    revocation: Option<Arc<dyn RevocationStore>>,
    timeout: Duration,
}

impl GatewayBuilder {
    fn new(downstream: &str) -> Self {
        let mut vars = HashMap::new();
        vars.insert("JWT_SECRET".to_string(), SECRET.to_string());
        for key in [
            "CUSTOMER_SERVICE_URL",
            "RISK_SERVICE_URL",
            "PAYMENT_SERVICE_URL",
            "ML_SERVICE_URL",
            "FEATURE_STORE_URL",
        ] {
            vars.insert(key.to_string(), downstream.to_string());
        }
        Self {
            vars,
            revocation: None,
            timeout: Duration::from_secs(10),
        }
    }

    fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }

    fn revocation(mut self, store: FakeStore) -> Self {
        self.revocation = Some(Arc::new(store));
        self
    }

    fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build(self) -> Router {
        let vars = self.vars;
        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        let auth = Arc::new(Authenticator::new(
            TokenVerifier::new(&config.jwt_secret, config.jwt_leeway_seconds),
            self.revocation,
        ));
        let dispatcher = Dispatcher::with_timeout(self.timeout).unwrap();
        let state = AppState::new(&config, auth, dispatcher);
        build_router(state, &config)
    }
}

enum FakeStore {
    Revoked,
    Down,
}

#[async_trait]
impl RevocationStore for FakeStore {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn is_revoked(&self, _token: &str) -> Result<bool, CacheError> {
        match self {
            FakeStore::Revoked => Ok(true),
            FakeStore::Down => Err(CacheError::BackendConnection("connection refused".into())),
        }
    }
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn assert_envelope(body: &Value, error: &str, message: &str) {
    assert_eq!(body["error"], error, "body: {body}");
    assert_eq!(body["message"], message, "body: {body}");
    assert!(
        body["correlationId"].as_str().is_some_and(|id| !id.is_empty()),
        "body: {body}"
    );
}

// -- Health -------------------------------------------------------------------

#[tokio::test]
async fn health_endpoints_need_no_token() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(app.clone(), "GET", "/health", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "fintech-api-gateway");
    assert!(body["uptime"].is_number());

    let (status, _, body) = send(app.clone(), "GET", "/health/ready", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["services"].as_array().unwrap().len(), 5);
    assert_eq!(body["services"][0]["name"], "customer-service");
    assert_eq!(body["services"][0]["configured"], true);
    assert_eq!(body["revocationCheck"], false);

    let (status, _, body) = send(app, "GET", "/health/live", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn responses_carry_security_headers_and_a_correlation_id() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (_, headers, body) = send(app, "GET", "/health", &[]).await;
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");

    let echoed = headers["x-correlation-id"].to_str().unwrap();
    assert!(echoed.starts_with("gateway-"));
    assert_eq!(body["correlationId"], echoed);
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn missing_authorization_is_rejected() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(app, "GET", "/api/customer/customers/1", &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, "Unauthorized", "Missing or invalid authorization header");
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/customers/1",
        &[("authorization", "Basic dXNlcjpwYXNz")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, "Unauthorized", "Missing or invalid authorization header");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();
    let expired = token(json!({ "sub": "user-42", "role": "admin", "exp": now() - 60 }));

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/customers/1",
        &[("authorization", &bearer(&expired))],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, "Unauthorized", "Token has expired");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_invalid() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();
    let forged = jsonwebtoken::encode(
        &Header::default(),
        &json!({ "sub": "user-42", "exp": now() + 3600 }),
        &EncodingKey::from_secret(b"not-the-secret"),
    )
    .unwrap();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/risk/assess",
        &[("authorization", &bearer(&forged))],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, "Unauthorized", "Invalid token");
}

#[tokio::test]
async fn revoked_token_is_rejected() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream)
        .revocation(FakeStore::Revoked)
        .build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/customers/1",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&body, "Unauthorized", "Token has been revoked");
}

#[tokio::test]
async fn revocation_store_outage_fails_open() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream)
        .revocation(FakeStore::Down)
        .build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/customers/1",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "/customers/1");
}

// -- Authorization ------------------------------------------------------------

#[tokio::test]
async fn payment_requires_admin_by_default() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(
        app.clone(),
        "POST",
        "/api/payment/transfers",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_envelope(&body, "Forbidden", "Insufficient permissions");

    let (status, _, body) = send(
        app,
        "POST",
        "/api/payment-processing/transfers",
        &[("authorization", &bearer(&user_token("admin", &[])))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/transfers");
}

#[tokio::test]
async fn configured_permission_is_enforced() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream)
        .var("RISK_REQUIRED_PERMISSION", "risk:read")
        .build();

    let (status, _, body) = send(
        app.clone(),
        "GET",
        "/api/risk/assess",
        &[("authorization", &bearer(&user_token("analyst", &["customer:read"])))],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_envelope(&body, "Forbidden", "Permission 'risk:read' required");

    let (status, _, _) = send(
        app,
        "GET",
        "/api/risk/assess",
        &[("authorization", &bearer(&user_token("analyst", &["risk:read"])))],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// -- Forwarding ---------------------------------------------------------------

#[tokio::test]
async fn both_aliases_reach_the_same_downstream_path() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();
    let auth = bearer(&user_token("viewer", &[]));

    for uri in [
        "/api/customer/customers/1?expand=accounts",
        "/api/customer-management/customers/1?expand=accounts",
    ] {
        let (status, _, body) = send(app.clone(), "GET", uri, &[("authorization", &auth)]).await;
        assert_eq!(status, StatusCode::OK, "uri: {uri}");
        assert_eq!(body["path"], "/customers/1");
        assert_eq!(body["query"], "expand=accounts");
    }
}

#[tokio::test]
async fn bare_prefix_is_forwarded_to_downstream_root() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/features",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "/");
}

#[tokio::test]
async fn forwarded_request_carries_gateway_metadata() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();
    let auth = bearer(&user_token("viewer", &[]));

    let (status, headers, body) = send(
        app,
        "GET",
        "/api/ml/predict",
        &[
            ("authorization", &auth),
            ("host", "gateway.local"),
            ("x-correlation-id", "client-trace-7"),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correlationId"], "client-trace-7");
    assert_eq!(body["gatewayService"], "fintech-api-gateway");
    assert_eq!(body["authorization"], auth.as_str());
    assert_eq!(body["host"], downstream.trim_start_matches("http://"));
    assert_eq!(headers["x-correlation-id"], "client-trace-7");
}

#[tokio::test]
async fn downstream_errors_pass_through_untouched() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/missing",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "customer not found" }));
}

#[tokio::test]
async fn unreachable_service_is_reported_by_name() {
    let downstream = spawn_downstream().await;
    let dead = closed_port().await;
    let app = GatewayBuilder::new(&downstream)
        .var("RISK_SERVICE_URL", &dead)
        .build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/risk/assess",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_envelope(
        &body,
        "Service Unavailable",
        "The risk service is currently unavailable",
    );
}

#[tokio::test]
async fn slow_service_times_out() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream)
        .timeout(Duration::from_millis(200))
        .build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/slow",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_envelope(
        &body,
        "Gateway Timeout",
        "Request timeout while connecting to the customer service",
    );
}

// -- Errors -------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_is_not_found() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(app, "GET", "/api/unknown/thing", &[]).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, "Not Found", "Route not found");
}

#[tokio::test]
async fn prefix_lookalike_is_not_routed() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(app, "GET", "/api/customers/1", &[]).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&body, "Not Found", "Route not found");
}

#[tokio::test]
async fn inbound_correlation_id_is_echoed_on_errors() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, headers, body) = send(
        app,
        "GET",
        "/api/payment/transfers",
        &[("x-correlation-id", "trace-abc")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["correlationId"], "trace-abc");
    assert_eq!(headers["x-correlation-id"], "trace-abc");
}

#[tokio::test]
async fn clients_over_the_limit_are_throttled() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream)
        .var("RATE_LIMIT_MAX", "2")
        .build();
    let forwarded = [("x-forwarded-for", "203.0.113.9")];

    for _ in 0..2 {
        let (status, _, _) = send(app.clone(), "GET", "/health/live", &forwarded).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _, body) = send(app.clone(), "GET", "/health/live", &forwarded).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_envelope(&body, "Too Many Requests", "Too many requests from this IP");

    let (status, _, _) = send(
        app,
        "GET",
        "/health/live",
        &[("x-forwarded-for", "198.51.100.1")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn trailing_slash_reaches_downstream_root() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, body) = send(
        app,
        "GET",
        "/api/customer/",
        &[("authorization", &bearer(&user_token("viewer", &[])))],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["path"], "/");
}

#[tokio::test]
async fn inbound_correlation_id_with_spaces_is_kept() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, headers, body) = send(
        app,
        "GET",
        "/api/payment/x",
        &[("x-correlation-id", "order 42")],
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["correlationId"], "order 42");
    assert_eq!(headers["x-correlation-id"], "order 42");
}

#[tokio::test]
async fn oversized_body_is_rejected_with_an_envelope() {
    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();
    let too_big = 10 * 1024 * 1024 + 1;

    let request = Request::builder()
        .method("POST")
        .uri("/api/customer/documents")
        .header("authorization", bearer(&user_token("viewer", &[])))
        .header("content-length", too_big.to_string())
        .body(Body::from(vec![0u8; too_big]))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_envelope(&body, "Payload Too Large", "Request body too large");
}

// -- Production mode ----------------------------------------------------------

#[tokio::test]
async fn details_are_exposed_only_outside_production() {
    let downstream = spawn_downstream().await;
    let not_yet_valid = token(json!({
        "sub": "user-42",
        "nbf": now() + 600,
        "exp": now() + 3600,
    }));
    let auth = bearer(&not_yet_valid);

    let dev = GatewayBuilder::new(&downstream).build();
    let (status, _, body) = send(dev, "GET", "/api/ml/predict", &[("authorization", &auth)]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, "Internal Server Error", "Authentication service error");
    assert!(body["details"].is_string());

    let prod = GatewayBuilder::new(&downstream)
        .var("APP_ENV", "production")
        .build();
    let (status, _, body) = send(prod, "GET", "/api/ml/predict", &[("authorization", &auth)]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&body, "Internal Server Error", "Authentication service error");
    assert!(body.get("details").is_none());
}

// -- Audit logging ------------------------------------------------------------

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn each_authenticated_request_writes_one_audit_line_with_its_correlation_id() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::new("audit=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(logs.clone()),
        );
    // Current-thread runtime: the thread-local default covers every task.
    let _guard = tracing::subscriber::set_default(subscriber);

    let downstream = spawn_downstream().await;
    let app = GatewayBuilder::new(&downstream).build();

    let (status, _, _) = send(
        app.clone(),
        "GET",
        "/api/customer/customers/1",
        &[
            ("authorization", &bearer(&user_token("viewer", &[]))),
            ("x-correlation-id", "audit-ok-1"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        app,
        "GET",
        "/api/customer/customers/1",
        &[("x-correlation-id", "audit-denied-2")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let lines = logs.lines();
    assert_eq!(lines.len(), 2, "audit lines: {lines:#?}");
    assert!(lines[0].contains("authentication successful"));
    assert!(lines[0].contains("audit-ok-1"));
    assert!(lines[0].contains("user-42"));
    assert!(lines[1].contains("authentication failed"));
    assert!(lines[1].contains("audit-denied-2"));
}
