use async_trait::async_trait;
use sessionlock_core::AppResult;
use sessionlock_domain::LeaseDuration;

/// Atomic key-value primitives a distributed lock is built on.
///
/// Every method must map onto one atomic store-side operation. Implementing
/// any of them as a client-side read followed by a write breaks mutual
/// exclusion. Keys are already namespaced by the caller.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Writes `token` with a ttl of `lease` only when `key` is absent.
    ///
    /// Returns false when the key already exists.
    async fn create_if_absent(&self, key: &str, token: &[u8], lease: LeaseDuration)
    -> AppResult<bool>;

    /// Resets the ttl of `key` to `lease` only when it still stores `token`.
    ///
    /// Returns false when the key is missing or owned by another token.
    async fn refresh_if_owner(&self, key: &str, token: &[u8], lease: LeaseDuration)
    -> AppResult<bool>;

    /// Deletes `key` only when it still stores `token`.
    ///
    /// Returns false when nothing was deleted.
    async fn delete_if_owner(&self, key: &str, token: &[u8]) -> AppResult<bool>;

    /// Returns whether `key` currently exists, whoever owns it.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Cheap liveness check.
    async fn health_check(&self) -> AppResult<()>;
}
