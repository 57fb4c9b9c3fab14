//! Shared primitives for all Rust crates in sessionlock.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across sessionlock crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
///
/// Lock callers branch on these variants: `Contention` is normal, `LockLost`
/// ends the critical section, `StoreUnavailable` is worth a retry with
/// backoff and `Cancelled` is the caller's own abort coming back.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation conflicts with the local state of a handle.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Lock key is already held by another owner.
    #[error("lock contended: {0}")]
    Contention(String),

    /// Ownership of a previously held lock could not be verified.
    #[error("lock lost: {0}")]
    LockLost(String),

    /// Backing key-value store could not be reached or failed the command.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Caller cancelled the operation.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true when repeating the same call later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_) | Self::StoreUnavailable(_))
    }
}
