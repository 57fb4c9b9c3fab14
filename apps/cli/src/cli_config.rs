use std::env;
use std::time::Duration;

use sessionlock_application::LockSettings;
use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::{
    DEFAULT_LOCK_KEY_PREFIX, DEFAULT_SESSION_KEY_PREFIX, LeaseDuration, ensure_disjoint_namespaces,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackendConfig {
    Redis { url: String },
    RedisCluster { nodes: Vec<String> },
    InMemory,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub backend: StoreBackendConfig,
    pub session_key_prefix: String,
    pub lock_settings: LockSettings,
}

impl CliConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let backend = match lookup("SESSION_STORE_BACKEND")
            .unwrap_or_else(|| "redis".to_owned())
            .trim()
        {
            "redis" => StoreBackendConfig::Redis {
                url: required_non_empty(&lookup, "REDIS_URL")?,
            },
            "redis_cluster" => {
                let nodes: Vec<String> = required_non_empty(&lookup, "REDIS_CLUSTER_NODES")?
                    .split(',')
                    .map(|node| node.trim().to_owned())
                    .filter(|node| !node.is_empty())
                    .collect();
                if nodes.is_empty() {
                    return Err(AppError::Validation(
                        "REDIS_CLUSTER_NODES must list at least one node".to_owned(),
                    ));
                }
                StoreBackendConfig::RedisCluster { nodes }
            }
            "memory" => StoreBackendConfig::InMemory,
            other => {
                return Err(AppError::Validation(format!(
                    "SESSION_STORE_BACKEND must be one of 'redis', 'redis_cluster' or 'memory', got '{other}'"
                )));
            }
        };

        let session_key_prefix = lookup("SESSION_KEY_PREFIX")
            .unwrap_or_else(|| DEFAULT_SESSION_KEY_PREFIX.to_owned());
        let key_prefix =
            lookup("LOCK_KEY_PREFIX").unwrap_or_else(|| DEFAULT_LOCK_KEY_PREFIX.to_owned());
        ensure_disjoint_namespaces(session_key_prefix.as_str(), key_prefix.as_str())?;

        let lease = LeaseDuration::from_millis(parse_u64(&lookup, "LOCK_LEASE_MS", 5_000)?)
            .map_err(|error| AppError::Validation(format!("invalid LOCK_LEASE_MS: {error}")))?;
        let retry_interval_ms = parse_u64(&lookup, "LOCK_RETRY_INTERVAL_MS", 100)?;
        let acquire_timeout_ms = parse_u64(&lookup, "LOCK_ACQUIRE_TIMEOUT_MS", 3_000)?;
        let store_operation_timeout_ms = parse_u64(&lookup, "STORE_OPERATION_TIMEOUT_MS", 0)?;

        if retry_interval_ms == 0 {
            return Err(AppError::Validation(
                "LOCK_RETRY_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        let lock_settings = LockSettings {
            key_prefix,
            lease,
            retry_interval: Duration::from_millis(retry_interval_ms),
            acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            store_operation_timeout: (store_operation_timeout_ms > 0)
                .then(|| Duration::from_millis(store_operation_timeout_ms)),
        };

        Ok(Self {
            backend,
            session_key_prefix,
            lock_settings,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn required_non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> AppResult<String> {
    let value = lookup(name).ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> AppResult<u64> {
    match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
