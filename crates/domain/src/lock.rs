//! Lock identity, ownership and lifecycle types.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sessionlock_core::{AppError, AppResult, NonEmptyString};
use uuid::Uuid;

/// Default namespace prepended to every lock key in the store.
pub const DEFAULT_LOCK_KEY_PREFIX: &str = "lock:";

/// Resource identifier protected by a distributed lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey(NonEmptyString);

impl LockKey {
    /// Creates a validated lock key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("lock key must not be empty".to_owned()))
    }

    /// Returns the resource identifier without namespace.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the key as written to the store under the given namespace.
    #[must_use]
    pub fn store_key(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0.as_str())
    }
}

impl Display for LockKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Random identifier proving ownership of one acquisition.
///
/// A new token is generated for every acquisition attempt, so a handle that
/// releases and re-acquires never reuses its previous token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(Uuid);

impl OwnerToken {
    /// Generates a fresh random owner token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the opaque bytes stored as the lock value.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for OwnerToken {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0.simple())
    }
}

const DEFAULT_LEASE: Duration = Duration::from_secs(5);

/// Time-to-live written to the store on every acquire and refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeaseDuration(Duration);

impl LeaseDuration {
    /// Creates a lease duration of at least one millisecond.
    pub fn new(duration: Duration) -> AppResult<Self> {
        if duration.as_millis() == 0 {
            return Err(AppError::Validation(
                "lock lease must be at least one millisecond".to_owned(),
            ));
        }

        if u64::try_from(duration.as_millis()).is_err() {
            return Err(AppError::Validation(
                "lock lease does not fit in milliseconds".to_owned(),
            ));
        }

        Ok(Self(duration))
    }

    /// Creates a lease duration from milliseconds.
    pub fn from_millis(millis: u64) -> AppResult<Self> {
        Self::new(Duration::from_millis(millis))
    }

    /// Returns the lease as a standard duration.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Returns the lease in whole milliseconds.
    #[must_use]
    pub fn as_millis(&self) -> u64 {
        u64::try_from(self.0.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for LeaseDuration {
    fn default() -> Self {
        Self(DEFAULT_LEASE)
    }
}

/// Local lifecycle of one lock handle.
///
/// This is advisory for the owning process only. The key's presence in the
/// store is what decides whether the resource is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Never acquired by this handle.
    Unlocked,
    /// Acquired and not yet released or found lost.
    Held,
    /// Released explicitly or found lost on refresh.
    Released,
}

impl LockState {
    /// Returns the stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlocked => "unlocked",
            Self::Held => "held",
            Self::Released => "released",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::{DEFAULT_LOCK_KEY_PREFIX, LeaseDuration, LockKey, LockState, OwnerToken};

    #[test]
    fn lock_key_rejects_blank_values() {
        assert!(LockKey::new("").is_err());
        assert!(LockKey::new("  \t").is_err());
    }

    #[test]
    fn store_key_prepends_namespace() {
        let key = LockKey::new("session:42").unwrap_or_else(|_| unreachable!());
        assert_eq!(key.store_key(DEFAULT_LOCK_KEY_PREFIX), "lock:session:42");
    }

    #[test]
    fn owner_tokens_are_unique_per_generation() {
        let first = OwnerToken::generate();
        let second = OwnerToken::generate();

        assert_ne!(first, second);
        assert_eq!(first.as_bytes().len(), 16);
        assert_eq!(first.to_string().len(), 32);
    }

    #[test]
    fn lease_duration_rejects_sub_millisecond_values() {
        assert!(LeaseDuration::new(Duration::ZERO).is_err());
        assert!(LeaseDuration::new(Duration::from_micros(999)).is_err());
        assert!(LeaseDuration::from_millis(1).is_ok());
    }

    #[test]
    fn lease_duration_reports_millis() {
        let lease = LeaseDuration::new(Duration::from_secs(5)).unwrap_or_else(|_| unreachable!());
        assert_eq!(lease.as_millis(), 5_000);
        assert_eq!(lease.as_duration(), Duration::from_secs(5));
    }

    #[test]
    fn lock_state_serializes_as_snake_case() {
        let encoded = serde_json::to_string(&LockState::Held).unwrap_or_default();
        assert_eq!(encoded, "\"held\"");
        assert_eq!(LockState::Released.as_str(), "released");
    }

    proptest! {
        #[test]
        fn store_key_keeps_prefix_and_resource(
            prefix in "[a-z]{0,8}:?",
            resource in "[a-zA-Z0-9:_-]{1,32}",
        ) {
            let key = LockKey::new(resource.clone()).unwrap_or_else(|_| unreachable!());
            let store_key = key.store_key(prefix.as_str());

            prop_assert!(store_key.starts_with(prefix.as_str()));
            prop_assert!(store_key.ends_with(resource.as_str()));
            prop_assert_eq!(store_key.len(), prefix.len() + resource.len());
        }
    }
}
