use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sessionlock_application::{LockStore, SessionBlobStore};
use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::LeaseDuration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoreEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl StoreEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process adapter for the session and lock ports.
///
/// Blobs and locks share one keyspace, as they do in Redis. Expired entries
/// are dropped lazily when touched. Only useful within a single process.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, StoreEntry>>,
}

impl InMemorySessionStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<String, StoreEntry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut StoreEntry> {
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        entries.get_mut(key)
    }
}

fn expiry_after(now: Instant, ttl: Duration) -> AppResult<Instant> {
    now.checked_add(ttl).ok_or_else(|| {
        AppError::Validation(format!("expiration out of range: {}ms", ttl.as_millis()))
    })
}

#[async_trait]
impl SessionBlobStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, key, Instant::now()).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], expiration: Duration) -> AppResult<()> {
        if expiration.as_millis() == 0 {
            return Err(AppError::Validation(
                "session expiration must be at least one millisecond".to_owned(),
            ));
        }

        let expires_at = expiry_after(Instant::now(), expiration)?;
        self.entries.lock().await.insert(
            key.to_owned(),
            StoreEntry {
                value: value.to_vec(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl LockStore for InMemorySessionStore {
    async fn create_if_absent(
        &self,
        key: &str,
        token: &[u8],
        lease: LeaseDuration,
    ) -> AppResult<bool> {
        let now = Instant::now();
        let expires_at = expiry_after(now, lease.as_duration())?;
        let mut entries = self.entries.lock().await;
        if Self::live_entry(&mut entries, key, now).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_owned(),
            StoreEntry {
                value: token.to_vec(),
                expires_at,
            },
        );

        Ok(true)
    }

    async fn refresh_if_owner(
        &self,
        key: &str,
        token: &[u8],
        lease: LeaseDuration,
    ) -> AppResult<bool> {
        let now = Instant::now();
        let expires_at = expiry_after(now, lease.as_duration())?;
        let mut entries = self.entries.lock().await;
        match Self::live_entry(&mut entries, key, now) {
            Some(entry) if entry.value.as_slice() == token => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_owner(&self, key: &str, token: &[u8]) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let owned = Self::live_entry(&mut entries, key, now)
            .is_some_and(|entry| entry.value.as_slice() == token);
        if owned {
            entries.remove(key);
        }

        Ok(owned)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, key, Instant::now()).is_some())
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}
