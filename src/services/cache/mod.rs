//! Key-value cache access. The revocation store is the only consumer.
pub mod client;
pub mod valkey;

pub use client::{CacheClient, CacheError, CacheResult};
pub use valkey::ValkeyClient;
