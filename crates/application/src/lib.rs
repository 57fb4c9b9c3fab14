//! Application services and ports.

#![forbid(unsafe_code)]

mod cancellation;
mod distributed_lock;
mod lock_settings;
mod session_ports;
mod session_storage_service;

pub use distributed_lock::DistributedLock;
pub use lock_settings::LockSettings;
pub use session_ports::{
    LockEvent, LockObserver, LockOperation, LockStore, NoopLockObserver, SessionBlobStore,
};
pub use session_storage_service::SessionStorageService;
