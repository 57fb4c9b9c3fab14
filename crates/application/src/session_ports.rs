mod blob_store;
mod lock_store;
mod observer;

pub use blob_store::SessionBlobStore;
pub use lock_store::LockStore;
pub use observer::{LockEvent, LockObserver, LockOperation, NoopLockObserver};
