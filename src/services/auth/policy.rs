//! Route access policy: role membership and permission membership.
//!
//! Both checks are pure predicates over an already-attached `Identity`.
//! Logging of denials is done by the middleware that applies them.

use std::collections::BTreeSet;

use super::identity::Identity;
use crate::error::AppError;

/// Acceptable roles for a route. Empty means "any authenticated caller".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: BTreeSet<String>,
}

impl RoleRequirement {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn check(&self, identity: Option<&Identity>) -> Result<(), AppError> {
        let identity = identity.ok_or(AppError::Unauthenticated)?;
        if self.roles.is_empty() {
            return Ok(());
        }
        match identity.role.as_deref() {
            Some(role) if self.roles.contains(role) => Ok(()),
            _ => Err(AppError::InsufficientRole),
        }
    }
}

/// A single permission the caller must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequirement {
    permission: String,
}

impl PermissionRequirement {
    pub fn new(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
        }
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn check(&self, identity: Option<&Identity>) -> Result<(), AppError> {
        let identity = identity.ok_or(AppError::Unauthenticated)?;
        if identity.has_permission(&self.permission) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermission {
                permission: self.permission.clone(),
            })
        }
    }
}

/// Per-route policy, configured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    pub roles: RoleRequirement,
    pub permission: Option<PermissionRequirement>,
}

impl AccessPolicy {
    pub fn new<I, S>(roles: I, permission: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: RoleRequirement::new(roles),
            permission: permission
                .filter(|p| !p.is_empty())
                .map(PermissionRequirement::new),
        }
    }

    /// `true` when neither check can ever reject.
    pub fn is_open(&self) -> bool {
        self.roles.is_empty() && self.permission.is_none()
    }
}
