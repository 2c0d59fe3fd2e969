//! Backing Store Module
//!
//! The persistent key/value space the indexing layer is built on.
//!
//! ## Responsibilities
//! - Open or create a named store, reporting a missing store distinctly
//! - get/set/delete by byte-string key
//! - Ordered prefix iteration (used to load one attribute column)
//! - Sync, compaction and close
//!
//! ## Backends
//! - `FileStore`: append-only CRC-framed log, replayed into memory on open
//! - `MemoryStore`: process-local map, nothing survives close

mod file;
mod memory;
mod record;
mod uri;

pub use file::{FileStore, ReplayStats};
pub use memory::MemoryStore;
pub use record::{
    LogRecord, FILE_HEADER_SIZE, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE, MAX_VALUE_SIZE,
};
pub use uri::StoreUri;

use crate::config::Config;
use crate::error::Result;

/// A byte-keyed persistent key space
///
/// Keys iterate in lexicographic byte order. After `close()` every other
/// method fails with `StoreClosed`.
pub trait BackingStore: Send {
    /// Read the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite `key`
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove `key`. Returns `true` if it existed.
    fn delete(&mut self, key: &[u8]) -> Result<bool>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Number of live keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fraction of stored records that are superseded or deleted
    fn dead_ratio(&self) -> f64 {
        0.0
    }

    /// Make every accepted write durable
    fn sync(&mut self) -> Result<()>;

    /// Drop superseded records from the underlying storage
    fn compact(&mut self) -> Result<()>;

    /// Sync and release the underlying resource
    fn close(&mut self) -> Result<()>;
}

/// Open the backing store named by `uri`
///
/// Returns the store and whether it was created by this call.
/// Fails with `StoreNotFound` when the store is absent and
/// `config.create_if_missing` is false; nothing is created in that case.
pub fn open(uri: &StoreUri, config: &Config) -> Result<(Box<dyn BackingStore>, bool)> {
    match uri {
        StoreUri::File(path) => {
            let (store, created) =
                FileStore::open(path, config.create_if_missing, config.sync_strategy)?;
            Ok((Box::new(store), created))
        }
        StoreUri::Memory(name) => {
            let store = MemoryStore::open(name, config.create_if_missing)?;
            Ok((Box::new(store), true))
        }
    }
}
