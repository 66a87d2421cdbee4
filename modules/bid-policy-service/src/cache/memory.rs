//! In-process cache backend.
//!
//! Uses moka::sync::Cache bounded by capacity only. Entries carry their own
//! expiry and are never evicted on a timer; readers decide liveness.

use async_trait::async_trait;
use chrono::Utc;
use moka::sync::Cache;
use std::time::Duration;

use super::{CacheEntry, RequestCache};
use crate::error::CacheError;

pub struct MemoryCache {
    entries: Cache<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Inserts an entry with an explicit expiry.
    pub fn insert_entry(&self, key: &str, entry: CacheEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[async_trait]
impl RequestCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CacheError::Unavailable(format!("invalid ttl: {}", e)))?;
        if ttl <= chrono::Duration::zero() {
            return Err(CacheError::Unavailable("ttl must be positive".to_string()));
        }
        self.insert_entry(
            key,
            CacheEntry {
                value,
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new(16);
        assert!(cache.get("u1:policy:a").await.unwrap().is_none());

        cache
            .set("u1:policy:a", "payload".to_string(), Duration::from_secs(300))
            .await
            .unwrap();
        let entry = cache.get("u1:policy:a").await.unwrap().unwrap();
        assert_eq!(entry.value, "payload");
        assert!(entry.is_live_at(Utc::now()));
        assert!(entry.expires_at <= Utc::now() + chrono::Duration::seconds(300));

        cache.delete("u1:policy:a").await.unwrap();
        assert!(cache.get("u1:policy:a").await.unwrap().is_none());
        // Deleting a missing key is not an error.
        cache.delete("u1:policy:a").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_entries_stay_until_read() {
        let cache = MemoryCache::new(16);
        cache.insert_entry(
            "k",
            CacheEntry {
                value: "stale".to_string(),
                expires_at: Utc::now() - chrono::Duration::minutes(1),
            },
        );
        let entry = cache.get("k").await.unwrap().unwrap();
        assert!(!entry.is_live_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_rejects_zero_ttl() {
        let cache = MemoryCache::new(16);
        assert!(cache.set("k", "v".to_string(), Duration::ZERO).await.is_err());
        assert!(!cache.contains("k"));
    }
}
