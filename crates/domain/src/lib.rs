//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod lock;
mod session;

pub use lock::{DEFAULT_LOCK_KEY_PREFIX, LeaseDuration, LockKey, LockState, OwnerToken};
pub use session::{DEFAULT_SESSION_KEY_PREFIX, SessionKey, ensure_disjoint_namespaces};
