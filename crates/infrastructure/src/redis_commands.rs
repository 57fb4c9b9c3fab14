//! Redis commands shared by the single-node and cluster adapters.
//!
//! Every lock primitive is one atomic server-side step: `SET NX PX` for the
//! conditional create and Lua scripts for compare-and-extend and
//! compare-and-delete. Each touches a single key, so scripts route to the
//! owning slot in cluster mode.

use std::time::Duration;

use redis::aio::ConnectionLike;
use redis::{RedisError, Script};
use sessionlock_core::{AppError, AppResult};
use sessionlock_domain::LeaseDuration;
use tracing::debug;

const REFRESH_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

const RELEASE_LOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

pub(crate) async fn create_if_absent<C>(
    connection: &mut C,
    key: &str,
    token: &[u8],
    lease: LeaseDuration,
) -> AppResult<bool>
where
    C: ConnectionLike + Send,
{
    let reply: Option<String> = redis::cmd("SET")
        .arg(key)
        .arg(token)
        .arg("NX")
        .arg("PX")
        .arg(lease.as_millis())
        .query_async(connection)
        .await
        .map_err(|error| store_error("failed to acquire lock", error))?;

    let acquired = reply.is_some();
    debug!(key, acquired, lease_ms = lease.as_millis(), "redis SET NX PX");
    Ok(acquired)
}

pub(crate) async fn refresh_if_owner<C>(
    connection: &mut C,
    key: &str,
    token: &[u8],
    lease: LeaseDuration,
) -> AppResult<bool>
where
    C: ConnectionLike + Send,
{
    let script = Script::new(REFRESH_LOCK_SCRIPT);
    let refreshed = script
        .key(key)
        .arg(token)
        .arg(lease.as_millis())
        .invoke_async::<i64>(connection)
        .await
        .map_err(|error| store_error("failed to refresh lock", error))?;

    debug!(key, refreshed, lease_ms = lease.as_millis(), "redis refresh lock");
    Ok(refreshed > 0)
}

pub(crate) async fn delete_if_owner<C>(
    connection: &mut C,
    key: &str,
    token: &[u8],
) -> AppResult<bool>
where
    C: ConnectionLike + Send,
{
    let script = Script::new(RELEASE_LOCK_SCRIPT);
    let deleted = script
        .key(key)
        .arg(token)
        .invoke_async::<i64>(connection)
        .await
        .map_err(|error| store_error("failed to release lock", error))?;

    debug!(key, deleted, "redis release lock");
    Ok(deleted > 0)
}

pub(crate) async fn exists<C>(connection: &mut C, key: &str) -> AppResult<bool>
where
    C: ConnectionLike + Send,
{
    let present: bool = redis::cmd("EXISTS")
        .arg(key)
        .query_async(connection)
        .await
        .map_err(|error| store_error("failed to check key", error))?;

    debug!(key, present, "redis EXISTS");
    Ok(present)
}

pub(crate) async fn get<C>(connection: &mut C, key: &str) -> AppResult<Option<Vec<u8>>>
where
    C: ConnectionLike + Send,
{
    let value: Option<Vec<u8>> = redis::cmd("GET")
        .arg(key)
        .query_async(connection)
        .await
        .map_err(|error| store_error("failed to read session", error))?;

    debug!(key, found = value.is_some(), "redis GET");
    Ok(value)
}

pub(crate) async fn set<C>(
    connection: &mut C,
    key: &str,
    value: &[u8],
    expiration: Duration,
) -> AppResult<()>
where
    C: ConnectionLike + Send,
{
    let expiration_ms = expiration_millis(expiration)?;

    redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("PX")
        .arg(expiration_ms)
        .query_async::<()>(connection)
        .await
        .map_err(|error| store_error("failed to write session", error))?;

    debug!(key, bytes = value.len(), expiration_ms, "redis SET PX");
    Ok(())
}

pub(crate) async fn del<C>(connection: &mut C, key: &str) -> AppResult<()>
where
    C: ConnectionLike + Send,
{
    let removed: i64 = redis::cmd("DEL")
        .arg(key)
        .query_async(connection)
        .await
        .map_err(|error| store_error("failed to delete session", error))?;

    debug!(key, removed, "redis DEL");
    Ok(())
}

pub(crate) async fn ping<C>(connection: &mut C) -> AppResult<()>
where
    C: ConnectionLike + Send,
{
    let reply: String = redis::cmd("PING")
        .query_async(connection)
        .await
        .map_err(|error| store_error("failed to ping redis", error))?;

    if reply != "PONG" {
        return Err(AppError::Internal(format!(
            "unexpected redis PING reply '{reply}'"
        )));
    }

    Ok(())
}

pub(crate) fn store_error(context: &str, error: RedisError) -> AppError {
    AppError::StoreUnavailable(format!("{context}: {error}"))
}

fn expiration_millis(expiration: Duration) -> AppResult<u64> {
    match u64::try_from(expiration.as_millis()) {
        Ok(0) => Err(AppError::Validation(
            "session expiration must be at least one millisecond".to_owned(),
        )),
        Ok(millis) => Ok(millis),
        Err(error) => Err(AppError::Validation(format!(
            "session expiration out of range: {error}"
        ))),
    }
}
