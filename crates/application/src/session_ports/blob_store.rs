use std::time::Duration;

use async_trait::async_trait;
use sessionlock_core::AppResult;

/// Plain storage port for opaque session blobs.
#[async_trait]
pub trait SessionBlobStore: Send + Sync {
    /// Returns the blob stored under `key`, or none when missing or expired.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Stores one blob with a ttl.
    async fn set(&self, key: &str, value: &[u8], expiration: Duration) -> AppResult<()>;

    /// Deletes one blob. Deleting a missing key succeeds.
    async fn del(&self, key: &str) -> AppResult<()>;

    /// Checks that the store answers.
    async fn ping(&self) -> AppResult<()>;
}
