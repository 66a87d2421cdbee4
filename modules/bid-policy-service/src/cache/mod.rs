//! Key-value cache contract used by the cache-aside layer.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::CacheError;

pub use memory::MemoryCache;

/// A cached value together with the instant it stops being valid.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Live only while the expiry is strictly in the future.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Cache for serialized policy reads.
///
/// Implementations do not need to evict expired entries themselves; expiry
/// is checked by the reader against [`CacheEntry::expires_at`].
#[async_trait]
pub trait RequestCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Liveness check for health reporting.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Cache key for one policy, scoped by its owner.
pub fn policy_key(owner_id: &str, policy_id: &str) -> String {
    format!("{}:policy:{}", owner_id, policy_id)
}
