//! Session blob keys.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sessionlock_core::{AppError, AppResult, NonEmptyString};

/// Default namespace prepended to every session blob key in the store.
pub const DEFAULT_SESSION_KEY_PREFIX: &str = "session:";

/// Identifier of one persisted session blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(NonEmptyString);

impl SessionKey {
    /// Creates a validated session key.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("session key must not be empty".to_owned()))
    }

    /// Returns the session identifier without namespace.
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

/// Checks that session keys and lock keys can never map to the same store key.
///
/// Both prefixes must be non-empty and neither may start with the other;
/// otherwise some session key namespaces onto some lock key.
pub fn ensure_disjoint_namespaces(session_prefix: &str, lock_prefix: &str) -> AppResult<()> {
    if session_prefix.is_empty() || lock_prefix.is_empty() {
        return Err(AppError::Validation(
            "session and lock key prefixes must not be empty".to_owned(),
        ));
    }

    if session_prefix.starts_with(lock_prefix) || lock_prefix.starts_with(session_prefix) {
        return Err(AppError::Validation(format!(
            "session key prefix '{session_prefix}' overlaps lock key prefix '{lock_prefix}'"
        )));
    }

    Ok(())
}

impl Display for SessionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}
