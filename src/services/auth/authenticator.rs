//! Bearer authentication: header extraction → revocation check → verification.
//!
//! The revocation store is an optional capability injected at construction.
//! A store failure does not block authentication (fail-open); an explicit
//! revocation marker does (fail-closed).

use std::fmt;
use std::sync::Arc;

use axum::http::HeaderValue;

use super::identity::Identity;
use super::revocation::RevocationStore;
use super::token::{TokenError, TokenVerifier};
use crate::error::AppError;

const BEARER_PREFIX: &str = "Bearer ";

/// What happened during the revocation step. Reported on the request's auth log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationCheck {
    /// No store configured.
    Disabled,
    /// Not reached (the request failed before the lookup).
    Skipped,
    Clear,
    Revoked,
    /// Store errored; verification continued without the check.
    StoreUnavailable,
}

impl RevocationCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Skipped => "skipped",
            Self::Clear => "clear",
            Self::Revoked => "revoked",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

#[derive(Debug)]
pub struct AuthOutcome {
    pub revocation: RevocationCheck,
    /// Store error text when `revocation` is `StoreUnavailable`.
    pub revocation_error: Option<String>,
    pub result: Result<Identity, AppError>,
}

impl AuthOutcome {
    fn fail(revocation: RevocationCheck, error: AppError) -> Self {
        Self {
            revocation,
            revocation_error: None,
            result: Err(error),
        }
    }
}

pub struct Authenticator {
    verifier: TokenVerifier,
    revocation: Option<Arc<dyn RevocationStore>>,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("verifier", &self.verifier)
            .field(
                "revocation",
                &self.revocation.as_ref().map(|s| s.backend_name()),
            )
            .finish()
    }
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier, revocation: Option<Arc<dyn RevocationStore>>) -> Self {
        Self {
            verifier,
            revocation,
        }
    }

    pub fn revocation_enabled(&self) -> bool {
        self.revocation.is_some()
    }

    /// Authenticate from the raw `Authorization` header value.
    pub async fn authenticate(&self, authorization: Option<&HeaderValue>) -> AuthOutcome {
        let Some(token) = bearer_token(authorization) else {
            return AuthOutcome::fail(RevocationCheck::Skipped, AppError::MissingCredential);
        };

        let mut revocation_error = None;
        let revocation = match &self.revocation {
            None => RevocationCheck::Disabled,
            Some(store) => match store.is_revoked(token).await {
                Ok(true) => {
                    return AuthOutcome::fail(RevocationCheck::Revoked, AppError::RevokedToken);
                }
                Ok(false) => RevocationCheck::Clear,
                Err(err) => {
                    revocation_error = Some(err.to_string());
                    RevocationCheck::StoreUnavailable
                }
            },
        };

        let result = self.verifier.verify(token).map_err(|err| match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid(_) => AppError::InvalidToken,
            TokenError::Verifier(e) => AppError::AuthServiceError(e.to_string()),
        });

        AuthOutcome {
            revocation,
            revocation_error,
            result,
        }
    }
}

/// Extract the token after the literal `Bearer ` scheme prefix.
fn bearer_token(header: Option<&HeaderValue>) -> Option<&str> {
    let raw = header?.to_str().ok()?;
    raw.strip_prefix(BEARER_PREFIX)
}
