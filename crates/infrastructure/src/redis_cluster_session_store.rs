//! Redis cluster session store and lock store.

use std::time::Duration;

use async_trait::async_trait;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use sessionlock_application::{LockStore, SessionBlobStore};
use sessionlock_core::AppResult;
use sessionlock_domain::LeaseDuration;
use tokio::sync::OnceCell;

use crate::redis_commands::{self, store_error};

/// Redis cluster implementation of the session and lock ports.
///
/// The cluster connection discovers slots on first use and is shared by all
/// later calls; it reconnects to moved or failed nodes on its own.
pub struct RedisClusterSessionStore {
    client: ClusterClient,
    connection: OnceCell<ClusterConnection>,
}

impl RedisClusterSessionStore {
    /// Creates one adapter over a configured cluster client.
    #[must_use]
    pub fn new(client: ClusterClient) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
        }
    }

    async fn connection(&self) -> AppResult<ClusterConnection> {
        self.connection
            .get_or_try_init(|| async {
                self.client
                    .get_async_connection()
                    .await
                    .map_err(|error| store_error("failed to connect to redis cluster", error))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl SessionBlobStore for RedisClusterSessionStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut connection = self.connection().await?;
        redis_commands::get(&mut connection, key).await
    }

    async fn set(&self, key: &str, value: &[u8], expiration: Duration) -> AppResult<()> {
        let mut connection = self.connection().await?;
        redis_commands::set(&mut connection, key, value, expiration).await
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        let mut connection = self.connection().await?;
        redis_commands::del(&mut connection, key).await
    }

    async fn ping(&self) -> AppResult<()> {
        let mut connection = self.connection().await?;
        redis_commands::ping(&mut connection).await
    }
}

#[async_trait]
impl LockStore for RedisClusterSessionStore {
    async fn create_if_absent(
        &self,
        key: &str,
        token: &[u8],
        lease: LeaseDuration,
    ) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        redis_commands::create_if_absent(&mut connection, key, token, lease).await
    }

    async fn refresh_if_owner(
        &self,
        key: &str,
        token: &[u8],
        lease: LeaseDuration,
    ) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        redis_commands::refresh_if_owner(&mut connection, key, token, lease).await
    }

    async fn delete_if_owner(&self, key: &str, token: &[u8]) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        redis_commands::delete_if_owner(&mut connection, key, token).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        redis_commands::exists(&mut connection, key).await
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut connection = self.connection().await?;
        redis_commands::ping(&mut connection).await
    }
}
