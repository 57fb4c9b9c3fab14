//! Lock observer that writes lifecycle events to `tracing`.

use sessionlock_application::{LockEvent, LockObserver};
use tracing::{debug, info, warn};

/// Structured `tracing` sink for lock events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLockObserver;

impl TracingLockObserver {
    /// Creates the observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LockObserver for TracingLockObserver {
    fn on_event(&self, event: LockEvent<'_>) {
        match event {
            LockEvent::Acquired { key, token, lease } => {
                info!(key, token = %token, lease_ms = lease.as_millis(), "lock acquired");
            }
            LockEvent::Contended { key } => {
                debug!(key, "lock contended");
            }
            LockEvent::TimedOut { key, waited } => {
                info!(
                    key,
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "lock wait timed out"
                );
            }
            LockEvent::Refreshed { key, token, lease } => {
                debug!(key, token = %token, lease_ms = lease.as_millis(), "lock refreshed");
            }
            LockEvent::Lost { key, token } => {
                warn!(key, token = %token, "lock ownership lost");
            }
            LockEvent::Released { key, token } => {
                info!(key, token = %token, "lock released");
            }
            LockEvent::ReleaseSkipped { key, token } => {
                warn!(key, token = %token, "lock release skipped, token no longer owns the key");
            }
            LockEvent::StoreFailed {
                key,
                operation,
                error,
            } => {
                warn!(
                    key,
                    operation = operation.as_str(),
                    error = %error,
                    "lock store call failed"
                );
            }
        }
    }
}
