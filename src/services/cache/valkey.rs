use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

/// Upper bound on a single lookup, connection setup included.
/// A stalled store must not stall authentication.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-only Valkey/Redis client.
///
/// The connection is opened on first use. A failed attempt leaves the cell
/// empty, so the next call tries again; once open, `ConnectionManager`
/// reconnects on its own. Either way an outage is a per-call `CacheError`.
#[derive(Clone)]
pub struct ValkeyClient {
    client: redis::Client,
    manager: Arc<OnceCell<ConnectionManager>>,
}

impl std::fmt::Debug for ValkeyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyClient")
            .field("connected", &self.manager.initialized())
            .finish_non_exhaustive()
    }
}

impl ValkeyClient {
    /// Parse `url` (e.g. `redis://localhost:6379`). No I/O happens here.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self {
            client,
            manager: Arc::new(OnceCell::new()),
        })
    }

    pub async fn ping(&self) -> CacheResult<()> {
        let _: redis::Value = self.run(redis::cmd("PING")).await?;
        Ok(())
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(Some(COMMAND_TIMEOUT))
            .set_number_of_retries(1);

        self.manager
            .get_or_try_init(|| async {
                self.client
                    .get_connection_manager_with_config(config)
                    .await
                    .map_err(|e| CacheError::BackendConnection(e.to_string()))
            })
            .await
            .cloned()
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> CacheResult<T> {
        let call = async {
            let mut conn = self.connection().await?;
            cmd.query_async(&mut conn)
                .await
                .map_err(|e| CacheError::BackendCommand(e.to_string()))
        };

        match tokio::time::timeout(COMMAND_TIMEOUT, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::BackendCommand(format!(
                "no reply within {}s",
                COMMAND_TIMEOUT.as_secs()
            ))),
        }
    }
}

/// Presence-preserving conversion of a GET reply. Only `Nil` means absent.
fn value_bytes(value: redis::Value) -> Option<Vec<u8>> {
    match value {
        redis::Value::Nil => None,
        redis::Value::BulkString(bytes) => Some(bytes),
        redis::Value::SimpleString(s) => Some(s.into_bytes()),
        _ => Some(Vec::new()),
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        let value: redis::Value = self.run(cmd).await?;
        Ok(value_bytes(value))
    }
}
