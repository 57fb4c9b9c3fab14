//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_session_store;
mod redis_cluster_session_store;
mod redis_commands;
mod redis_session_store;
mod tracing_lock_observer;

pub use in_memory_session_store::InMemorySessionStore;
pub use redis_cluster_session_store::RedisClusterSessionStore;
pub use redis_session_store::RedisSessionStore;
pub use tracing_lock_observer::TracingLockObserver;
