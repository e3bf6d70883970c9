/// Factory: build the `Authenticator` (and its optional revocation store) from `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{
    Authenticator, CacheRevocationStore, RevocationStore, TokenVerifier,
};
use crate::services::cache::{CacheClient, CacheError, ValkeyClient};

/// Only a malformed `REDIS_URL` is an error. A configured store that is down
/// stays attached; each lookup fails open until it comes back.
pub async fn build_authenticator(config: &Config) -> Result<Arc<Authenticator>, CacheError> {
    let verifier = TokenVerifier::new(&config.jwt_secret, config.jwt_leeway_seconds);
    let revocation = match config.redis_url.as_deref() {
        Some(url) => Some(revocation_store(url).await?),
        None => {
            tracing::info!("REDIS_URL not set, token revocation check disabled");
            None
        }
    };

    Ok(Arc::new(Authenticator::new(verifier, revocation)))
}

async fn revocation_store(url: &str) -> Result<Arc<dyn RevocationStore>, CacheError> {
    let client = ValkeyClient::new(url)?;

    match client.ping().await {
        Ok(()) => {
            tracing::info!(backend = client.backend_name(), "token revocation check enabled")
        }
        Err(err) => tracing::warn!(
            backend = client.backend_name(),
            error = %err,
            "revocation store unreachable, lookups fail open until it recovers"
        ),
    }

    Ok(Arc::new(CacheRevocationStore::new(Arc::new(client))))
}
