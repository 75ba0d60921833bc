//! Name to IPv4 address cache backed by durable storage.

mod error;
mod storage;
mod store;

pub use error::StoreError;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{CacheEntry, RecordStore};
