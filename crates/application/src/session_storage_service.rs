use std::sync::Arc;
use std::time::Duration;

use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::{
    DEFAULT_SESSION_KEY_PREFIX, LockKey, SessionKey, ensure_disjoint_namespaces,
};
use tokio_util::sync::CancellationToken;

use crate::cancellation::run_store_call;
use crate::distributed_lock::DistributedLock;
use crate::lock_settings::LockSettings;
use crate::session_ports::{LockObserver, LockStore, NoopLockObserver, SessionBlobStore};

/// Uniform session storage client over any store topology.
#[derive(Clone)]
pub struct SessionStorageService {
    blobs: Arc<dyn SessionBlobStore>,
    locks: Arc<dyn LockStore>,
    observer: Arc<dyn LockObserver>,
    session_key_prefix: String,
    lock_settings: LockSettings,
}

impl SessionStorageService {
    /// Creates a service over one blob store and one lock store, with
    /// session keys under the default namespace.
    pub fn new(
        blobs: Arc<dyn SessionBlobStore>,
        locks: Arc<dyn LockStore>,
        lock_settings: LockSettings,
    ) -> AppResult<Self> {
        Self::with_namespaces(blobs, locks, DEFAULT_SESSION_KEY_PREFIX, lock_settings)
    }

    /// Creates a service with an explicit session key namespace.
    ///
    /// The session prefix and the lock prefix from `lock_settings` must be
    /// disjoint so a session write can never overwrite a lock.
    pub fn with_namespaces(
        blobs: Arc<dyn SessionBlobStore>,
        locks: Arc<dyn LockStore>,
        session_key_prefix: impl Into<String>,
        lock_settings: LockSettings,
    ) -> AppResult<Self> {
        lock_settings.validate()?;
        let session_key_prefix = session_key_prefix.into();
        ensure_disjoint_namespaces(
            session_key_prefix.as_str(),
            lock_settings.key_prefix.as_str(),
        )?;

        Ok(Self {
            blobs,
            locks,
            observer: Arc::new(NoopLockObserver),
            session_key_prefix,
            lock_settings,
        })
    }

    /// Sets the observer handed to every lock created by this service.
    #[must_use]
    pub fn with_lock_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Sets the namespace prepended to session keys.
    ///
    /// Rejects a prefix that could collide with the lock namespace.
    pub fn with_session_key_prefix(mut self, prefix: impl Into<String>) -> AppResult<Self> {
        let prefix = prefix.into();
        ensure_disjoint_namespaces(prefix.as_str(), self.lock_settings.key_prefix.as_str())?;
        self.session_key_prefix = prefix;
        Ok(self)
    }

    /// Returns the lock settings applied to new handles.
    #[must_use]
    pub fn lock_settings(&self) -> &LockSettings {
        &self.lock_settings
    }

    /// Loads one session blob.
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        key: &SessionKey,
    ) -> AppResult<Option<Vec<u8>>> {
        let store_key = key.store_key(self.session_key_prefix.as_str());
        run_store_call(
            cancel,
            self.lock_settings.store_operation_timeout,
            || format!("get of session '{store_key}'"),
            self.blobs.get(store_key.as_str()),
        )
        .await
    }

    /// Stores one session blob with a non-zero expiration.
    pub async fn set(
        &self,
        cancel: &CancellationToken,
        key: &SessionKey,
        value: &[u8],
        expiration: Duration,
    ) -> AppResult<()> {
        if expiration.as_millis() == 0 {
            return Err(AppError::Validation(
                "session expiration must be at least one millisecond".to_owned(),
            ));
        }

        let store_key = key.store_key(self.session_key_prefix.as_str());
        run_store_call(
            cancel,
            self.lock_settings.store_operation_timeout,
            || format!("set of session '{store_key}'"),
            self.blobs.set(store_key.as_str(), value, expiration),
        )
        .await
    }

    /// Deletes one session blob.
    pub async fn del(&self, cancel: &CancellationToken, key: &SessionKey) -> AppResult<()> {
        let store_key = key.store_key(self.session_key_prefix.as_str());
        run_store_call(
            cancel,
            self.lock_settings.store_operation_timeout,
            || format!("del of session '{store_key}'"),
            self.blobs.del(store_key.as_str()),
        )
        .await
    }

    /// Checks that the store answers.
    pub async fn ping(&self, cancel: &CancellationToken) -> AppResult<()> {
        run_store_call(
            cancel,
            self.lock_settings.store_operation_timeout,
            || "ping of session store".to_owned(),
            self.blobs.ping(),
        )
        .await
    }

    /// Creates an unlocked handle for `key`.
    #[must_use]
    pub fn lock(&self, key: LockKey) -> DistributedLock {
        DistributedLock::new(self.locks.clone(), key, &self.lock_settings)
            .with_observer(self.observer.clone())
    }
}
