//! Lease-based distributed mutual exclusion over a [`LockStore`].
//!
//! A [`DistributedLock`] is one logical owner of one key. Acquisition writes a
//! fresh random token with a ttl through the store's atomic create-if-absent,
//! refresh and release are compare-and-extend and compare-and-delete on that
//! token. A crashed owner blocks others for at most one lease.
//!
//! There is no fairness guarantee: contenders polling the same key race on
//! every attempt, and arrival order plays no part in who wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::{LeaseDuration, LockKey, LockState, OwnerToken};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancellation::run_store_call;
use crate::lock_settings::LockSettings;
use crate::session_ports::{LockEvent, LockObserver, LockOperation, LockStore, NoopLockObserver};

/// Handle for one distributed lock.
///
/// Mutating operations take `&mut self`; a handle is not meant to be shared
/// between tasks without external synchronization.
pub struct DistributedLock {
    store: Arc<dyn LockStore>,
    observer: Arc<dyn LockObserver>,
    key: LockKey,
    store_key: String,
    lease: LeaseDuration,
    retry_interval: Duration,
    acquire_timeout: Duration,
    store_operation_timeout: Option<Duration>,
    token: Option<OwnerToken>,
    state: LockState,
}

impl DistributedLock {
    /// Creates an unlocked handle for `key`.
    #[must_use]
    pub fn new(store: Arc<dyn LockStore>, key: LockKey, settings: &LockSettings) -> Self {
        let store_key = key.store_key(settings.key_prefix.as_str());

        Self {
            store,
            observer: Arc::new(NoopLockObserver),
            key,
            store_key,
            lease: settings.lease,
            retry_interval: settings.retry_interval,
            acquire_timeout: settings.acquire_timeout,
            store_operation_timeout: settings.store_operation_timeout,
            token: None,
            state: LockState::Unlocked,
        }
    }

    /// Replaces the lifecycle observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LockObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the protected resource key.
    #[must_use]
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Returns the namespaced key used in the store.
    #[must_use]
    pub fn store_key(&self) -> &str {
        self.store_key.as_str()
    }

    /// Returns the local lifecycle state.
    #[must_use]
    pub fn state(&self) -> LockState {
        self.state
    }

    /// Returns the lease written by the next acquire or refresh.
    #[must_use]
    pub fn lease(&self) -> LeaseDuration {
        self.lease
    }

    /// Returns the token of the current acquisition while held.
    #[must_use]
    pub fn owner_token(&self) -> Option<OwnerToken> {
        self.held_token()
    }

    /// Attempts to take the lock.
    ///
    /// Returns `Ok(false)` when the key is held elsewhere and either
    /// `blocking` is false or `timeout` elapsed. Blocking attempts poll every
    /// `retry_interval`; a zero `timeout` makes one attempt, exactly like a
    /// non-blocking call. Store failures end the attempt immediately.
    ///
    /// A blocking call never outlives `timeout`: an attempt still in flight
    /// at the deadline is abandoned and reported as a timeout. An abandoned
    /// write may still land, in which case the key stays taken for at most
    /// one lease.
    pub async fn try_acquire(
        &mut self,
        cancel: &CancellationToken,
        blocking: bool,
        retry_interval: Duration,
        timeout: Duration,
    ) -> AppResult<bool> {
        if self.state == LockState::Held {
            return Err(AppError::Conflict(format!(
                "lock '{}' is already held by this handle",
                self.key
            )));
        }

        let waits = blocking && !timeout.is_zero();
        if waits && retry_interval.is_zero() {
            return Err(AppError::Validation(
                "lock retry interval must be greater than zero".to_owned(),
            ));
        }

        let token = OwnerToken::generate();
        let started = Instant::now();
        let deadline = if waits {
            started.checked_add(timeout)
        } else {
            None
        };

        if waits {
            let checked = within_deadline(
                deadline,
                self.store_call(
                    cancel,
                    LockOperation::HealthCheck,
                    self.store.health_check(),
                ),
            )
            .await;

            match checked {
                Some(result) => result?,
                None => {
                    let error = AppError::StoreUnavailable(format!(
                        "health check of lock '{}' did not answer within {}ms",
                        self.store_key,
                        timeout.as_millis()
                    ));
                    self.observer.on_event(LockEvent::StoreFailed {
                        key: self.store_key.as_str(),
                        operation: LockOperation::HealthCheck,
                        error: &error,
                    });
                    return Err(error);
                }
            }
        }

        loop {
            let attempt = within_deadline(
                deadline,
                self.store_call(
                    cancel,
                    LockOperation::Acquire,
                    self.store
                        .create_if_absent(self.store_key.as_str(), token.as_bytes(), self.lease),
                ),
            )
            .await;

            let Some(acquired) = attempt else {
                return Ok(self.timed_out(started));
            };

            if acquired? {
                self.token = Some(token);
                self.state = LockState::Held;
                self.observer.on_event(LockEvent::Acquired {
                    key: self.store_key.as_str(),
                    token,
                    lease: self.lease,
                });
                return Ok(true);
            }

            if !waits {
                self.observer.on_event(LockEvent::Contended {
                    key: self.store_key.as_str(),
                });
                return Ok(false);
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => return Ok(self.timed_out(started)),
                Some(deadline) => retry_interval.min(deadline.duration_since(now)),
                None => retry_interval,
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(AppError::Cancelled(format!(
                        "waiting for lock '{}' cancelled",
                        self.store_key
                    )));
                }
                () = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Blocking acquisition using the retry interval and timeout from settings.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> AppResult<bool> {
        let retry_interval = self.retry_interval;
        let timeout = self.acquire_timeout;
        self.try_acquire(cancel, true, retry_interval, timeout).await
    }

    /// Non-blocking acquisition reporting contention as an error.
    pub async fn obtain(&mut self, cancel: &CancellationToken) -> AppResult<()> {
        if self
            .try_acquire(cancel, false, Duration::ZERO, Duration::ZERO)
            .await?
        {
            return Ok(());
        }

        Err(AppError::Contention(format!(
            "lock '{}' is held by another owner",
            self.store_key
        )))
    }

    /// Extends the lease by the handle's lease duration.
    ///
    /// `LockLost` means another owner may now be inside the critical section;
    /// the caller must stop relying on exclusivity.
    pub async fn refresh(&mut self, cancel: &CancellationToken) -> AppResult<()> {
        let lease = self.lease;
        self.refresh_with(cancel, lease).await
    }

    /// Extends the lease by `lease`, which becomes the handle's lease.
    pub async fn refresh_with(
        &mut self,
        cancel: &CancellationToken,
        lease: LeaseDuration,
    ) -> AppResult<()> {
        let Some(token) = self.held_token() else {
            return Err(AppError::LockLost(format!(
                "lock '{}' is not held by this handle",
                self.store_key
            )));
        };

        let refreshed = self
            .store_call(
                cancel,
                LockOperation::Refresh,
                self.store
                    .refresh_if_owner(self.store_key.as_str(), token.as_bytes(), lease),
            )
            .await?;

        if !refreshed {
            self.state = LockState::Released;
            self.token = None;
            self.observer.on_event(LockEvent::Lost {
                key: self.store_key.as_str(),
                token,
            });
            return Err(AppError::LockLost(format!(
                "lock '{}' is no longer owned by token {token}",
                self.store_key
            )));
        }

        self.lease = lease;
        self.observer.on_event(LockEvent::Refreshed {
            key: self.store_key.as_str(),
            token,
            lease,
        });

        Ok(())
    }

    /// Deletes the key if this handle still owns it.
    ///
    /// Releasing a lock that expired or was taken over is a no-op, as is
    /// releasing twice. A store failure leaves the handle held so the call
    /// can be repeated.
    pub async fn release(&mut self, cancel: &CancellationToken) -> AppResult<()> {
        let Some(token) = self.held_token() else {
            return Ok(());
        };

        let deleted = self
            .store_call(
                cancel,
                LockOperation::Release,
                self.store
                    .delete_if_owner(self.store_key.as_str(), token.as_bytes()),
            )
            .await?;

        self.state = LockState::Released;
        self.token = None;

        let event = if deleted {
            LockEvent::Released {
                key: self.store_key.as_str(),
                token,
            }
        } else {
            LockEvent::ReleaseSkipped {
                key: self.store_key.as_str(),
                token,
            }
        };
        self.observer.on_event(event);

        Ok(())
    }

    /// Returns whether any owner currently holds the key.
    pub async fn peek(&self, cancel: &CancellationToken) -> AppResult<bool> {
        self.store_call(
            cancel,
            LockOperation::Peek,
            self.store.exists(self.store_key.as_str()),
        )
        .await
    }

    fn timed_out(&self, started: Instant) -> bool {
        self.observer.on_event(LockEvent::TimedOut {
            key: self.store_key.as_str(),
            waited: started.elapsed(),
        });
        false
    }

    fn held_token(&self) -> Option<OwnerToken> {
        match self.state {
            LockState::Held => self.token,
            LockState::Unlocked | LockState::Released => None,
        }
    }

    async fn store_call<T, F>(
        &self,
        cancel: &CancellationToken,
        operation: LockOperation,
        call: F,
    ) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let result = run_store_call(
            cancel,
            self.store_operation_timeout,
            || format!("{} of lock '{}'", operation.as_str(), self.store_key),
            call,
        )
        .await;

        if let Err(error) = &result
            && !matches!(error, AppError::Cancelled(_))
        {
            self.observer.on_event(LockEvent::StoreFailed {
                key: self.store_key.as_str(),
                operation,
                error,
            });
        }

        result
    }
}

/// Resolves `call` unless `deadline` passes first.
async fn within_deadline<T, F>(deadline: Option<Instant>, call: F) -> Option<AppResult<T>>
where
    F: Future<Output = AppResult<T>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, call).await.ok(),
        None => Some(call.await),
    }
}
