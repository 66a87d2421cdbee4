//! Cache-aside policy service.
//!
//! Reads go through the request cache first and fall back to the repository;
//! writes go to the repository and invalidate the cached copy. Every cache and
//! repository call is bounded by the configured operation deadline. A
//! repository call that misses it fails with [`ServiceError::Cancelled`]; a
//! cache call that misses it, like any other cache failure, is logged and
//! swallowed.

use bid_policy_types::{ComponentHealth, DocumentError, Policy, RuleNode, document};
use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{RequestCache, policy_key};
use crate::error::{CacheError, ServiceError};
use crate::repository::PolicyRepository;

/// How long a policy read stays in the request cache.
pub const POLICY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub struct PolicyService {
    repo: Arc<dyn PolicyRepository>,
    cache: Arc<dyn RequestCache>,
    op_timeout: Duration,
}

impl PolicyService {
    pub fn new(
        repo: Arc<dyn PolicyRepository>,
        cache: Arc<dyn RequestCache>,
        op_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            op_timeout,
        }
    }

    async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, ServiceError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| ServiceError::Cancelled)
    }

    /// Runs a cache call under the deadline. A timeout becomes an ordinary
    /// cache failure.
    async fn cache_call<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .unwrap_or_else(|_| Err(CacheError::Unavailable("deadline exceeded".to_string())))
    }

    /// Cache-aside read. `None` when the owner has no policy with this id.
    pub async fn get_policy(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, ServiceError> {
        let key = policy_key(owner_id, id);

        match self.cache_call(self.cache.get(&key)).await {
            Ok(Some(entry)) if entry.is_live_at(Utc::now()) => {
                match decode_cached(&entry.value) {
                    Ok(policy) => {
                        log::debug!("[POLICY_CACHE] hit {}", key);
                        return Ok(Some(policy));
                    }
                    Err(e) => log::warn!("[POLICY_CACHE] discarding unreadable entry {}: {}", key, e),
                }
            }
            Ok(Some(_)) => log::debug!("[POLICY_CACHE] expired {}", key),
            Ok(None) => log::debug!("[POLICY_CACHE] miss {}", key),
            Err(e) => log::warn!("[POLICY_CACHE] get {} failed: {}", key, e),
        }

        let Some(policy) = self.bounded(self.repo.get(owner_id, id)).await?? else {
            return Ok(None);
        };

        match serde_json::to_string(&policy) {
            Ok(value) => {
                if let Err(e) = self
                    .cache_call(self.cache.set(&key, value, POLICY_CACHE_TTL))
                    .await
                {
                    log::warn!("[POLICY_CACHE] set {} failed: {}", key, e);
                }
            }
            Err(e) => log::warn!("[POLICY_CACHE] encode {} failed: {}", key, e),
        }

        Ok(Some(policy))
    }

    /// Stores a new policy for `owner_id` and returns it with its assigned id.
    /// The cache is not pre-populated.
    pub async fn create_policy(
        &self,
        owner_id: &str,
        mut policy: Policy,
    ) -> Result<Policy, ServiceError> {
        policy.user_id = owner_id.to_string();
        let id = self.bounded(self.repo.create(&policy)).await??;
        log::info!("[POLICY_DB] created policy {} for {}", id, owner_id);
        policy.id = id;
        Ok(policy)
    }

    /// Lists the owner's policies, optionally for one marketplace. Not cached.
    pub async fn list_policies(
        &self,
        owner_id: &str,
        marketplace: Option<&str>,
    ) -> Result<Vec<Policy>, ServiceError> {
        Ok(self.bounded(self.repo.list(owner_id, marketplace)).await??)
    }

    /// Replaces `name` and `rules` of an existing policy, keeping its owner,
    /// marketplace and type. Returns the merged policy, or `None` if absent.
    pub async fn update_policy(
        &self,
        owner_id: &str,
        id: &str,
        name: String,
        rules: Option<RuleNode>,
    ) -> Result<Option<Policy>, ServiceError> {
        let Some(existing) = self.bounded(self.repo.get(owner_id, id)).await?? else {
            return Ok(None);
        };

        let merged = Policy {
            name,
            rules,
            ..existing
        };

        if !self.bounded(self.repo.update(owner_id, &merged)).await?? {
            return Ok(None);
        }
        log::info!("[POLICY_DB] updated policy {} for {}", id, owner_id);

        self.invalidate(owner_id, id).await;
        Ok(Some(merged))
    }

    /// Removes a policy. Returns whether one was deleted.
    pub async fn delete_policy(&self, owner_id: &str, id: &str) -> Result<bool, ServiceError> {
        let deleted = self.bounded(self.repo.delete(owner_id, id)).await??;
        self.invalidate(owner_id, id).await;
        if deleted.is_some() {
            log::info!("[POLICY_DB] deleted policy {} for {}", id, owner_id);
        }
        Ok(deleted.is_some())
    }

    async fn invalidate(&self, owner_id: &str, id: &str) {
        let key = policy_key(owner_id, id);
        if let Err(e) = self.cache_call(self.cache.delete(&key)).await {
            log::warn!("[POLICY_CACHE] delete {} failed: {}", key, e);
        }
    }

    /// Pings the document store and the cache.
    pub async fn health(&self) -> BTreeMap<String, ComponentHealth> {
        let mut components = BTreeMap::new();

        let store = match self.bounded(self.repo.ping()).await {
            Ok(Ok(())) => ComponentHealth::healthy(),
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(e) => ComponentHealth::unhealthy(e.to_string()),
        };
        components.insert("document_store".to_string(), store);

        let cache = match self.cache_call(self.cache.ping()).await {
            Ok(()) => ComponentHealth::healthy(),
            Err(e) => ComponentHealth::unhealthy(e.to_string()),
        };
        components.insert("cache".to_string(), cache);

        components
    }
}

/// Cached form of a policy.
///
/// Only trees that were valid when stored reach the cache, so the rules are
/// rebuilt with the structural document decoder. Trees read back from storage
/// with a missing branch therefore survive the round trip.
#[derive(Deserialize)]
struct CachedPolicy {
    #[serde(default)]
    id: String,
    user_id: String,
    marketplace: String,
    name: String,
    #[serde(rename = "type")]
    policy_type: String,
    #[serde(default)]
    rules: Option<serde_json::Value>,
}

fn decode_cached(value: &str) -> Result<Policy, DocumentError> {
    let cached: CachedPolicy =
        serde_json::from_str(value).map_err(|e| DocumentError::Malformed {
            kind: "cached policy",
            cause: e.to_string(),
        })?;

    Ok(Policy {
        rules: document::decode_optional(cached.rules.as_ref())?,
        id: cached.id,
        user_id: cached.user_id,
        marketplace: cached.marketplace,
        name: cached.name,
        policy_type: cached.policy_type,
    })
}
