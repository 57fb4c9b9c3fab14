use std::time::Duration;

use sessionlock_core::AppError;
use sessionlock_domain::{LeaseDuration, OwnerToken};

/// Store-facing step a lock event relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOperation {
    /// Conditional create.
    Acquire,
    /// Conditional ttl extension.
    Refresh,
    /// Conditional delete.
    Release,
    /// Presence check.
    Peek,
    /// Store liveness check.
    HealthCheck,
}

impl LockOperation {
    /// Returns the stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::Refresh => "refresh",
            Self::Release => "release",
            Self::Peek => "peek",
            Self::HealthCheck => "health_check",
        }
    }
}

/// Lifecycle notification emitted by a lock handle.
#[derive(Debug, Clone, Copy)]
pub enum LockEvent<'a> {
    /// The conditional create succeeded.
    Acquired {
        /// Namespaced store key.
        key: &'a str,
        /// Token written as the lock value.
        token: OwnerToken,
        /// Ttl written with the token.
        lease: LeaseDuration,
    },
    /// A non-blocking attempt found the key held.
    Contended {
        /// Namespaced store key.
        key: &'a str,
    },
    /// A blocking attempt gave up after its timeout.
    TimedOut {
        /// Namespaced store key.
        key: &'a str,
        /// Time spent waiting.
        waited: Duration,
    },
    /// The lease was extended.
    Refreshed {
        /// Namespaced store key.
        key: &'a str,
        /// Token that still owns the key.
        token: OwnerToken,
        /// Ttl written by the refresh.
        lease: LeaseDuration,
    },
    /// Ownership check failed during refresh.
    Lost {
        /// Namespaced store key.
        key: &'a str,
        /// Token that no longer owns the key.
        token: OwnerToken,
    },
    /// The key was deleted by its owner.
    Released {
        /// Namespaced store key.
        key: &'a str,
        /// Token that owned the key.
        token: OwnerToken,
    },
    /// Release found the key missing or owned by someone else.
    ReleaseSkipped {
        /// Namespaced store key.
        key: &'a str,
        /// Token that no longer owned the key.
        token: OwnerToken,
    },
    /// A store call failed or timed out.
    StoreFailed {
        /// Namespaced store key.
        key: &'a str,
        /// Step that failed.
        operation: LockOperation,
        /// Error returned to the caller.
        error: &'a AppError,
    },
}

/// Injectable hook receiving lock lifecycle events.
pub trait LockObserver: Send + Sync {
    /// Handles one event. Must not block.
    fn on_event(&self, event: LockEvent<'_>);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLockObserver;

impl LockObserver for NoopLockObserver {
    fn on_event(&self, _event: LockEvent<'_>) {}
}
