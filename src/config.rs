/*
 * Responsibility
 * - Read environment variables once at startup (JWT secret, Redis, downstream targets, ...)
 * - Validate values (fail startup when something required is missing or malformed)
 */
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::services::proxy::ServiceName;

const DEV_JWT_SECRET: &str = "fintech-platform-secret-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Downstream target for one logical service.
#[derive(Debug, Clone)]
pub struct ServiceTarget {
    pub service: ServiceName,
    pub base_url: Url,
    /// `true` when the address came from the environment rather than the default.
    pub configured: bool,
    pub required_roles: Vec<String>,
    pub required_permission: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub jwt_secret: String,
    pub jwt_leeway_seconds: u64,
    pub redis_url: Option<String>,

    pub services: Vec<ServiceTarget>,

    pub cors_allowed_origins: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub correlation_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` is the production entry-point; tests pass a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT".into()))?,
            None => 8080,
        };
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{port}"))
            .map_err(|_| ConfigError::Invalid("PORT".into()))?;

        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if app_env.is_production() => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET not set, using the development default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let jwt_leeway_seconds = parse_or(&get, "JWT_LEEWAY_SECONDS", 0u64)?;
        let redis_url = get("REDIS_URL");

        let services = ServiceName::ALL
            .iter()
            .map(|&service| service_target(&get, service))
            .collect::<Result<Vec<_>, _>>()?;

        let cors_allowed_origins = split_list(get("CORS_ALLOWED_ORIGINS"));

        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(parse_or(&get, "RATE_LIMIT_WINDOW_SECS", 15 * 60u64)?),
            max_requests: parse_or(&get, "RATE_LIMIT_MAX", 500u32)?,
        };

        let correlation_prefix =
            get("CORRELATION_ID_PREFIX").unwrap_or_else(|| "gateway".to_string());

        Ok(Self {
            addr,
            app_env,
            jwt_secret,
            jwt_leeway_seconds,
            redis_url,
            services,
            cors_allowed_origins,
            rate_limit,
            correlation_prefix,
        })
    }

    pub fn target(&self, service: ServiceName) -> Option<&ServiceTarget> {
        self.services.iter().find(|t| t.service == service)
    }
}

fn service_target<G>(get: &G, service: ServiceName) -> Result<ServiceTarget, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let url_key = service.url_env_key();
    let (raw, configured) = match get(url_key) {
        Some(v) => (v, true),
        None => (service.default_url().to_string(), false),
    };

    let base_url = Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid(url_key.into()))?;
    if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
        return Err(ConfigError::Invalid(url_key.into()));
    }

    let env_prefix = service.policy_env_prefix();
    let required_roles = match get(&format!("{env_prefix}_REQUIRED_ROLES")) {
        Some(raw) => split_list(Some(raw)),
        None => service
            .default_roles()
            .iter()
            .map(|r| r.to_string())
            .collect(),
    };
    let required_permission = get(&format!("{env_prefix}_REQUIRED_PERMISSION"))
        .map(|p| p.trim().to_string());

    Ok(ServiceTarget {
        service,
        base_url,
        configured,
        required_roles,
        required_permission,
    })
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key.into())),
        None => Ok(default),
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
