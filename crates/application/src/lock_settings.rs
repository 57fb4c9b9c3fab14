use std::time::Duration;

use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::{DEFAULT_LOCK_KEY_PREFIX, LeaseDuration};

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration applied to every lock handle created by one service.
#[derive(Debug, Clone)]
pub struct LockSettings {
    /// Namespace prepended to lock keys in the store.
    pub key_prefix: String,
    /// Ttl written on acquire and refresh.
    pub lease: LeaseDuration,
    /// Poll cadence for blocking acquisition.
    pub retry_interval: Duration,
    /// Maximum wait for blocking acquisition.
    pub acquire_timeout: Duration,
    /// Upper bound for one store round trip. `None` leaves it to the store.
    pub store_operation_timeout: Option<Duration>,
}

impl LockSettings {
    /// Creates settings with the given lease and default timings.
    #[must_use]
    pub fn new(lease: LeaseDuration) -> Self {
        Self {
            key_prefix: DEFAULT_LOCK_KEY_PREFIX.to_owned(),
            lease,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            store_operation_timeout: None,
        }
    }

    /// Checks the settings for values a lock cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.key_prefix.is_empty() {
            return Err(AppError::Validation(
                "lock key prefix must not be empty".to_owned(),
            ));
        }

        if self.retry_interval.is_zero() {
            return Err(AppError::Validation(
                "lock retry interval must be greater than zero".to_owned(),
            ));
        }

        if self.store_operation_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(AppError::Validation(
                "store operation timeout must be greater than zero when set".to_owned(),
            ));
        }

        Ok(())
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self::new(LeaseDuration::default())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::LockSettings;

    #[test]
    fn default_settings_are_valid() {
        let settings = LockSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.key_prefix, "lock:");
        assert_eq!(settings.lease.as_millis(), 5_000);
    }

    #[test]
    fn zero_retry_interval_is_rejected() {
        let settings = LockSettings {
            retry_interval: Duration::ZERO,
            ..LockSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn empty_key_prefix_is_rejected() {
        let settings = LockSettings {
            key_prefix: String::new(),
            ..LockSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_store_timeout_is_rejected() {
        let settings = LockSettings {
            store_operation_timeout: Some(Duration::ZERO),
            ..LockSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
