//! Redis single-node session store and lock store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use sessionlock_application::{LockStore, SessionBlobStore};
use sessionlock_core::AppResult;
use sessionlock_domain::LeaseDuration;

use crate::redis_commands::{self, store_error};

/// Redis single-node implementation of the session and lock ports.
#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    /// Creates one adapter over a configured Redis client.
    #[must_use]
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| store_error("failed to connect to redis", error))
    }
}

#[async_trait]
impl SessionBlobStore for RedisSessionStore {
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
impl LockStore for RedisSessionStore {
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
