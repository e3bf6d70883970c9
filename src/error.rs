/*
 * Responsibility
 * - Gateway-wide error taxonomy (AppError)
 * - ErrorEnvelope: the single JSON shape returned on every failure path
 * - IntoResponse for ApiError (AppError + correlation id + detail mode)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::middleware::correlation::CorrelationId;

/// Placeholder used when a failure happens before correlation assignment.
pub const UNKNOWN_CORRELATION_ID: &str = "unknown";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("missing or malformed bearer credential")]
    MissingCredential,
    #[error("token revoked")]
    RevokedToken,
    #[error("token expired")]
    TokenExpired,
    #[error("invalid token")]
    InvalidToken,
    #[error("authentication service error: {0}")]
    AuthServiceError(String),

    #[error("unauthenticated")]
    Unauthenticated,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("missing permission: {permission}")]
    InsufficientPermission { permission: String },

    /// `service` is `None` for transport errors that are not a plain connect failure.
    #[error("downstream unavailable: {}", .service.as_deref().unwrap_or("unknown"))]
    DownstreamUnavailable {
        service: Option<String>,
        reason: String,
    },
    #[error("downstream timeout: {}", .service.as_deref().unwrap_or("unknown"))]
    DownstreamTimeout { service: Option<String> },

    #[error("route not found")]
    NotFound,
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{0}")]
    Unclassified(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::Unclassified(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::MissingCredential
            | Self::RevokedToken
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InsufficientRole | Self::InsufficientPermission { .. } => StatusCode::FORBIDDEN,
            Self::DownstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::DownstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::AuthServiceError(_) | Self::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable kind name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Validation",
            Self::MissingCredential => "MissingCredential",
            Self::RevokedToken => "RevokedToken",
            Self::TokenExpired => "TokenExpired",
            Self::InvalidToken => "InvalidToken",
            Self::AuthServiceError(_) => "AuthServiceError",
            Self::Unauthenticated => "Unauthenticated",
            Self::InsufficientRole => "InsufficientRole",
            Self::InsufficientPermission { .. } => "InsufficientPermission",
            Self::DownstreamUnavailable { .. } => "DownstreamUnavailable",
            Self::DownstreamTimeout { .. } => "DownstreamTimeout",
            Self::NotFound => "NotFound",
            Self::RateLimited => "RateLimited",
            Self::Unclassified(_) => "Unclassified",
        }
    }

    fn public_message(&self, expose_details: bool) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::MissingCredential => "Missing or invalid authorization header".into(),
            Self::RevokedToken => "Token has been revoked".into(),
            Self::TokenExpired => "Token has expired".into(),
            Self::InvalidToken => "Invalid token".into(),
            Self::AuthServiceError(_) => "Authentication service error".into(),
            Self::Unauthenticated => "User not authenticated".into(),
            Self::InsufficientRole => "Insufficient permissions".into(),
            Self::InsufficientPermission { permission } => {
                format!("Permission '{permission}' required")
            }
            Self::DownstreamUnavailable {
                service: Some(service),
                ..
            } => format!("The {service} service is currently unavailable"),
            Self::DownstreamUnavailable { service: None, .. } => {
                "Unable to connect to downstream service".into()
            }
            Self::DownstreamTimeout {
                service: Some(service),
            } => format!("Request timeout while connecting to the {service} service"),
            Self::DownstreamTimeout { service: None } => {
                "Request timeout while connecting to downstream service".into()
            }
            Self::NotFound => "Route not found".into(),
            Self::RateLimited => "Too many requests from this IP".into(),
            Self::Unclassified(message) if expose_details => message.clone(),
            Self::Unclassified(_) => "An unexpected error occurred".into(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Validation { details, .. } => details.clone(),
            Self::AuthServiceError(reason) | Self::Unclassified(reason) => {
                Some(Value::String(reason.clone()))
            }
            Self::DownstreamUnavailable { reason, .. } => Some(Value::String(reason.clone())),
            _ => None,
        }
    }

    /// Attach the request's correlation id, producing a renderable error.
    pub fn at(self, correlation_id: Option<&CorrelationId>) -> ApiError {
        ApiError {
            status: self.status(),
            error: self,
            correlation_id: correlation_id
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| UNKNOWN_CORRELATION_ID.to_string()),
            expose_details: false,
        }
    }
}

/// `error` field of the envelope for a given status.
pub fn status_label(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "Validation Error",
        StatusCode::UNAUTHORIZED => "Unauthorized",
        StatusCode::FORBIDDEN => "Forbidden",
        StatusCode::NOT_FOUND => "Not Found",
        StatusCode::TOO_MANY_REQUESTS => "Too Many Requests",
        StatusCode::SERVICE_UNAVAILABLE => "Service Unavailable",
        StatusCode::GATEWAY_TIMEOUT => "Gateway Timeout",
        s if s.is_server_error() => "Internal Server Error",
        s => s.canonical_reason().unwrap_or("Error"),
    }
}

/// Wire shape of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Response extension marking a response whose body must not be rewritten:
/// either an `ErrorEnvelope` or a downstream response passed through as-is.
#[derive(Debug, Clone, Copy)]
pub struct Finalized;

/// An `AppError` bound to a request, ready to be rendered.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub status: StatusCode,
    pub correlation_id: String,
    pub expose_details: bool,
}

impl ApiError {
    /// Keep a status the taxonomy has no exact variant for (405, 413, ...).
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Include `details` in the envelope (non-production only).
    pub fn verbose(mut self, expose_details: bool) -> Self {
        self.expose_details = expose_details;
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: status_label(self.status).to_string(),
            message: self.error.public_message(self.expose_details),
            correlation_id: self.correlation_id.clone(),
            details: if self.expose_details {
                self.error.details()
            } else {
                None
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.envelope())).into_response();
        response.extensions_mut().insert(Finalized);
        response
    }
}
