use std::sync::Arc;

use async_trait::async_trait;

use crate::services::cache::{CacheClient, CacheError};

/// Revocation lookup:
/// - `Ok(true)`: the token carries a revocation marker
/// - `Ok(false)`: no marker
/// - `Err(_)`: store failure (the authenticator fails open on this)
#[async_trait]
pub trait RevocationStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn is_revoked(&self, token: &str) -> Result<bool, CacheError>;
}

/// Revocation store over a key-value cache: `GET <prefix>:<token>`.
pub struct CacheRevocationStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl<C: CacheClient> CacheRevocationStore<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self::new_with_prefix(cache, "blacklist")
    }

    pub fn new_with_prefix(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, token: &str) -> String {
        format!("{}:{}", self.prefix, token)
    }
}

#[async_trait]
impl<C: CacheClient> RevocationStore for CacheRevocationStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, CacheError> {
        let marker = self.cache.get_bytes(&self.key(token)).await?;
        Ok(marker.is_some())
    }
}
