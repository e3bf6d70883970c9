//! Static route table: path prefix → logical downstream service.
//!
//! The table is built once from `Config` and never mutated. Every logical
//! service owns a short alias (`/api/customer`) and, for the core banking
//! domains, a business-domain alias (`/api/customer-management`). Both aliases
//! resolve to the same target and forward the same rewritten path.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::config::{Config, ServiceTarget};
use crate::services::auth::AccessPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    Customer,
    Risk,
    Payment,
    Ml,
    Features,
}

impl ServiceName {
    pub const ALL: [ServiceName; 5] = [
        ServiceName::Customer,
        ServiceName::Risk,
        ServiceName::Payment,
        ServiceName::Ml,
        ServiceName::Features,
    ];

    /// Logical name used in logs and client-facing messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Risk => "risk",
            Self::Payment => "payment",
            Self::Ml => "ml",
            Self::Features => "features",
        }
    }

    /// Name reported by the readiness check.
    pub fn deployment_name(&self) -> &'static str {
        match self {
            Self::Customer => "customer-service",
            Self::Risk => "risk-service",
            Self::Payment => "payment-service",
            Self::Ml => "ml-service",
            Self::Features => "feature-store",
        }
    }

    pub fn url_env_key(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER_SERVICE_URL",
            Self::Risk => "RISK_SERVICE_URL",
            Self::Payment => "PAYMENT_SERVICE_URL",
            Self::Ml => "ML_SERVICE_URL",
            Self::Features => "FEATURE_STORE_URL",
        }
    }

    pub fn policy_env_prefix(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Risk => "RISK",
            Self::Payment => "PAYMENT",
            Self::Ml => "ML",
            Self::Features => "FEATURES",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            Self::Customer => "http://customer-service:8080",
            Self::Risk => "http://risk-service:8080",
            Self::Payment => "http://payment-service:8080",
            Self::Ml => "http://ml-service:8080",
            Self::Features => "http://feature-store:8080",
        }
    }

    pub fn default_roles(&self) -> &'static [&'static str] {
        match self {
            Self::Payment => &["admin"],
            _ => &[],
        }
    }

    /// Prefixes in match order: short alias first, then the business-domain alias.
    pub fn prefixes(&self) -> &'static [&'static str] {
        match self {
            Self::Customer => &["/api/customer", "/api/customer-management"],
            Self::Risk => &["/api/risk", "/api/risk-compliance"],
            Self::Payment => &["/api/payment", "/api/payment-processing"],
            Self::Ml => &["/api/ml"],
            Self::Features => &["/api/features"],
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical downstream service: where to send traffic and who may reach it.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    pub service: ServiceName,
    pub base_url: Url,
    pub policy: AccessPolicy,
}

impl RouteTarget {
    pub fn from_config(target: &ServiceTarget) -> Self {
        Self {
            service: target.service,
            base_url: target.base_url.clone(),
            policy: AccessPolicy::new(
                target.required_roles.iter().cloned(),
                target.required_permission.clone(),
            ),
        }
    }

    /// Absolute URL for a rewritten path + optional query.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        match query {
            Some(q) if !q.is_empty() => format!("{base}{path}?{q}"),
            _ => format!("{base}{path}"),
        }
    }
}

/// A single prefix entry of the ordered table.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub prefix: &'static str,
    pub target: Arc<RouteTarget>,
}

/// Result of resolving an inbound path.
#[derive(Debug, Clone)]
pub struct ResolvedRoute<'a> {
    pub entry: &'a RouteEntry,
    pub rewritten_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn from_config(config: &Config) -> Self {
        Self::from_targets(config.services.iter().map(RouteTarget::from_config))
    }

    pub fn from_targets(targets: impl IntoIterator<Item = RouteTarget>) -> Self {
        let mut entries = Vec::new();
        for target in targets {
            let target = Arc::new(target);
            for &prefix in target.service.prefixes() {
                entries.push(RouteEntry {
                    prefix,
                    target: Arc::clone(&target),
                });
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// First entry whose prefix matches `path` at a segment boundary.
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute<'_>> {
        self.entries.iter().find_map(|entry| {
            strip_route_prefix(path, entry.prefix).map(|rewritten_path| ResolvedRoute {
                entry,
                rewritten_path,
            })
        })
    }
}

/// Strip `prefix` from `path`; the rest must be empty or start a new segment.
pub fn strip_route_prefix(path: &str, prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}
