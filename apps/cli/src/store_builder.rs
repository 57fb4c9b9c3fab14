use std::sync::Arc;

use redis::cluster::ClusterClientBuilder;
use sessionlock_application::{LockStore, SessionBlobStore, SessionStorageService};
use sessionlock_core::{AppError, AppResult};
use sessionlock_infrastructure::{
    InMemorySessionStore, RedisClusterSessionStore, RedisSessionStore, TracingLockObserver,
};
use tracing::info;

use crate::cli_config::{CliConfig, StoreBackendConfig};

pub fn build_redis_client(redis_url: &str) -> AppResult<redis::Client> {
    redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))
}

pub fn build_redis_cluster_client(nodes: &[String]) -> AppResult<redis::cluster::ClusterClient> {
    ClusterClientBuilder::new(nodes.iter().map(String::as_str))
        .build()
        .map_err(|error| AppError::Validation(format!("invalid REDIS_CLUSTER_NODES: {error}")))
}

pub fn build_session_service(config: &CliConfig) -> AppResult<SessionStorageService> {
    let (blobs, locks): (Arc<dyn SessionBlobStore>, Arc<dyn LockStore>) = match &config.backend
    {
        StoreBackendConfig::Redis { url } => {
            let store = Arc::new(RedisSessionStore::new(build_redis_client(url)?));
            info!("using single-node redis session store");
            (store.clone(), store)
        }
        StoreBackendConfig::RedisCluster { nodes } => {
            let store = Arc::new(RedisClusterSessionStore::new(build_redis_cluster_client(
                nodes,
            )?));
            info!(nodes = nodes.len(), "using redis cluster session store");
            (store.clone(), store)
        }
        StoreBackendConfig::InMemory => {
            let store = Arc::new(InMemorySessionStore::new());
            info!("using in-memory session store");
            (store.clone(), store)
        }
    };

    Ok(SessionStorageService::with_namespaces(
        blobs,
        locks,
        config.session_key_prefix.clone(),
        config.lock_settings.clone(),
    )?
    .with_lock_observer(Arc::new(TracingLockObserver::new())))
}

#[cfg(test)]
mod tests {
    use sessionlock_application::LockSettings;

    use super::{build_redis_client, build_redis_cluster_client, build_session_service};
    use crate::cli_config::{CliConfig, StoreBackendConfig};

    #[test]
    fn malformed_redis_url_is_a_validation_error() {
        assert!(build_redis_client("not a url").is_err());
        assert!(build_redis_client("redis://127.0.0.1:6379").is_ok());
    }

    #[test]
    fn cluster_client_accepts_node_urls() {
        let nodes = vec![
            "redis://127.0.0.1:7000".to_owned(),
            "redis://127.0.0.1:7001".to_owned(),
        ];
        assert!(build_redis_cluster_client(&nodes).is_ok());
    }

    #[test]
    fn service_uses_configured_lock_settings() {
        let config = CliConfig {
            backend: StoreBackendConfig::InMemory,
            session_key_prefix: "sess.".to_owned(),
            lock_settings: LockSettings {
                key_prefix: "_lock.".to_owned(),
                ..LockSettings::default()
            },
        };

        let service = build_session_service(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(service.lock_settings().key_prefix, "_lock.");
    }
}
