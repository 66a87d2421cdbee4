//! Document-store contract for policies.

use async_trait::async_trait;
use bid_policy_types::Policy;

use crate::error::RepositoryError;

/// Authoritative policy storage. Every lookup is conjoined with the owner id.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, RepositoryError>;

    /// Stores a new policy and returns the id the store assigned to it. Any
    /// id already on `policy` is ignored.
    async fn create(&self, policy: &Policy) -> Result<String, RepositoryError>;

    async fn list(
        &self,
        owner_id: &str,
        marketplace: Option<&str>,
    ) -> Result<Vec<Policy>, RepositoryError>;

    /// Replaces the mutable fields (`name`, `rules`) of an existing policy.
    /// Returns `false` when no policy matches `(policy.id, owner_id)`.
    async fn update(&self, owner_id: &str, policy: &Policy) -> Result<bool, RepositoryError>;

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Option<Policy>, RepositoryError>;

    /// Liveness check for health reporting.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
