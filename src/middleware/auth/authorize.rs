//! Per-route authorization: role check, then permission check.
//!
//! Policies are plain values built at startup (`AccessPolicy`) and attached to
//! a route group here. Must run after `access::apply`.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::{ApiError, UNKNOWN_CORRELATION_ID};
use crate::middleware::correlation::CorrelationId;
use crate::services::auth::{AccessPolicy, Identity};
use crate::services::proxy::ServiceName;
use crate::state::AppState;

#[derive(Debug, Clone)]
struct RouteGuard {
    service: ServiceName,
    policy: AccessPolicy,
}

/// Attach `policy` to every route of `router`. Open policies add no layer.
pub fn apply(
    router: Router<AppState>,
    service: ServiceName,
    policy: AccessPolicy,
) -> Router<AppState> {
    if policy.is_open() {
        return router;
    }
    router.route_layer(middleware::from_fn_with_state(
        RouteGuard { service, policy },
        authorize,
    ))
}

async fn authorize(
    State(guard): State<RouteGuard>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    check(&guard, &req)?;
    Ok(next.run(req).await)
}

fn check(guard: &RouteGuard, req: &Request<Body>) -> Result<(), ApiError> {
    let identity = req.extensions().get::<Identity>();
    let correlation_id = req.extensions().get::<CorrelationId>();
    let cid = correlation_id
        .map(CorrelationId::as_str)
        .unwrap_or(UNKNOWN_CORRELATION_ID);

    if let Err(err) = guard.policy.roles.check(identity) {
        tracing::warn!(
            service = %guard.service,
            user_id = identity.map(|i| i.subject.as_str()),
            user_role = identity.map(Identity::role_or_empty),
            required_roles = ?guard.policy.roles.roles(),
            correlation_id = cid,
            "authorization failed - insufficient role"
        );
        return Err(err.at(correlation_id));
    }

    if let Some(requirement) = &guard.policy.permission {
        if let Err(err) = requirement.check(identity) {
            tracing::warn!(
                service = %guard.service,
                user_id = identity.map(|i| i.subject.as_str()),
                required_permission = requirement.permission(),
                user_permissions = ?identity.map(|i| &i.permissions),
                correlation_id = cid,
                "authorization failed - missing permission"
            );
            return Err(err.at(correlation_id));
        }
    }

    Ok(())
}
