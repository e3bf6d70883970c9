//! Cache client interface used by higher-level services (token revocation, ...).
use async_trait::async_trait;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command).
///
/// Kept independent from `AppError` so callers decide how to fail
/// (the revocation check fails open, for instance).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// A minimal, read-only cache interface.
///
/// Values are raw bytes: whatever a writer stored counts as present.
/// Writes (revoking a token) belong to the identity service.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get the raw value, `None` when the key is absent.
    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;
}
