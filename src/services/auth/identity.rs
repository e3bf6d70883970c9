/*
 * Responsibility
 * - The authenticated principal as seen by the rest of the gateway
 * - Built from verified claims by the authenticator and inserted into request extensions
 * - Immutable; lives for one request
 */
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub permissions: BTreeSet<String>,
    pub customer_id: Option<String>,
}

impl Identity {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn role_or_empty(&self) -> &str {
        self.role.as_deref().unwrap_or("")
    }
}
