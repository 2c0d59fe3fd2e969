//! Root Module
//!
//! The persisted root of a store and the registry of open attributes.
//!
//! ## Responsibilities
//! - Open/create the backing store and load or initialize the root record
//! - Hand out at most one live `AttributeStorage` per attribute id
//! - Flush dirty attributes and the root record to the backing store
//! - Close: flush, optionally compact, release the file
//!
//! ## Lifecycle
//! ```text
//!   open(uri, create) ──► Created | Opened ──► ... ──► close() ──► Closed
//!                                                        │
//!                            (every later call on the root or its
//!                             attribute handles: StoreClosed)
//! ```

mod handle;
mod record;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::attribute::{AttributeStorage, IndexMode, PendingChanges};
use crate::backing::{self, BackingStore, StoreUri};
use crate::config::Config;
use crate::error::{OffError, Result};
use crate::value::{AttributeId, Value};

pub use handle::Attribute;

use handle::Lifecycle;
use record::{RootRecord, ROOT_KEY};

/// How a root came to be open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStatus {
    /// The store (or its root record) did not exist and was initialized
    Created,

    /// An existing root record was loaded
    Opened,
}

/// Mutable root state, guarded by one mutex
struct RootInner {
    /// `None` once closed
    backing: Option<Box<dyn BackingStore>>,

    record: RootRecord,

    /// Root record differs from what the backing store holds
    record_dirty: bool,

    /// Live attribute storages, at most one per id
    attributes: HashMap<AttributeId, Arc<RwLock<AttributeStorage>>>,
}

/// An open object store
///
/// ## Concurrency
/// Single process, single writer. Root methods serialize on an internal
/// mutex; attribute handles lock their own storage.
pub struct ObjectStoreRoot {
    uri: StoreUri,
    config: Config,
    status: OpenStatus,
    lifecycle: Arc<Lifecycle>,
    inner: Mutex<RootInner>,
}

impl ObjectStoreRoot {
    /// Open the store at `uri`
    ///
    /// Fails with `StoreNotFound` when the store is absent and
    /// `create_if_missing` is false.
    pub fn open(uri: &str, create_if_missing: bool) -> Result<Self> {
        let config = Config::builder()
            .uri(uri)
            .create_if_missing(create_if_missing)
            .build();
        Self::open_with(config)
    }

    /// Open with a full config
    ///
    /// On open:
    /// 1. Parse the URI and open (or create) the backing store
    /// 2. Load the root record, or initialize and persist an empty one
    pub fn open_with(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Backing store
        let uri = StoreUri::parse(&config.uri)?;
        let (mut backing, created) = backing::open(&uri, &config)?;

        // Step 2: Root record
        let (record, status) = match backing.get(ROOT_KEY)? {
            Some(bytes) => (RootRecord::decode(&bytes)?, OpenStatus::Opened),
            None => {
                let record = RootRecord::new();
                backing.set(ROOT_KEY, &record.encode()?)?;
                backing.sync()?;
                (record, OpenStatus::Created)
            }
        };

        info!(
            uri = %uri,
            ?status,
            backing_created = created,
            attributes = record.attributes.len(),
            "object store open"
        );

        Ok(Self {
            uri,
            config,
            status,
            lifecycle: Arc::new(Lifecycle::default()),
            inner: Mutex::new(RootInner {
                backing: Some(backing),
                record,
                record_dirty: false,
                attributes: HashMap::new(),
            }),
        })
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Handle for attribute `id`
    ///
    /// The first access per open root builds the storage: restored from the
    /// backing store if the attribute was registered before, otherwise
    /// created empty in the mode chosen by `reversed_hint`. Later calls
    /// return the same live storage. The hint never changes the mode of an
    /// existing attribute; use `set_reverse()` for that.
    pub fn attribute(&self, id: AttributeId, reversed_hint: bool) -> Result<Attribute> {
        let mut inner = self.lock_open()?;
        self.attach(&mut inner, id, reversed_hint)
    }

    /// Handle for attribute `id` if it is already registered
    ///
    /// Unlike `attribute`, an unknown id yields `None` and leaves the root
    /// record untouched.
    pub fn existing_attribute(&self, id: AttributeId) -> Result<Option<Attribute>> {
        let mut inner = self.lock_open()?;
        if !inner.attributes.contains_key(&id) && !inner.record.attributes.contains_key(&id) {
            return Ok(None);
        }
        self.attach(&mut inner, id, false).map(Some)
    }

    /// Every attribute registered in the root record, ascending
    pub fn attribute_ids(&self) -> Result<Vec<AttributeId>> {
        let inner = self.lock_open()?;
        Ok(inner.record.attributes.keys().copied().collect())
    }

    /// Live storage for `id`, loading or registering it on first access
    fn attach(
        &self,
        inner: &mut RootInner,
        id: AttributeId,
        reversed_hint: bool,
    ) -> Result<Attribute> {
        if let Some(storage) = inner.attributes.get(&id) {
            return Ok(Attribute::new(id, Arc::clone(storage), Arc::clone(&self.lifecycle)));
        }

        let storage = match inner.record.attributes.get(&id).copied() {
            Some(mode) => {
                let backing = inner.backing.as_ref().ok_or(OffError::StoreClosed)?;
                let mut entries = Vec::new();
                for (key, bytes) in backing.scan_prefix(&record::attribute_prefix(id))? {
                    let object = record::decode_entry_key(&key)?;
                    let value: Value = bincode::deserialize(&bytes)?;
                    entries.push((object, value));
                }
                AttributeStorage::restore(id, mode, entries)
            }
            None => {
                let mode = IndexMode::from_reversed(reversed_hint);
                inner.record.attributes.insert(id, mode);
                inner.record_dirty = true;
                debug!(attribute = id, ?mode, "registered attribute");
                AttributeStorage::new(id, reversed_hint)
            }
        };

        let storage = Arc::new(RwLock::new(storage));
        inner.attributes.insert(id, Arc::clone(&storage));
        Ok(Attribute::new(id, storage, Arc::clone(&self.lifecycle)))
    }

    // =========================================================================
    // Root Metadata
    // =========================================================================

    pub fn metadata(&self, key: &str) -> Result<Option<String>> {
        let inner = self.lock_open()?;
        Ok(inner.record.metadata.get(key).cloned())
    }

    /// Set a metadata value; persisted on the next flush or close
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let mut inner = self.lock_open()?;
        inner.record.metadata.insert(key.into(), value.into());
        inner.record_dirty = true;
        Ok(())
    }

    pub fn remove_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.lock_open()?;
        let removed = inner.record.metadata.remove(key);
        if removed.is_some() {
            inner.record_dirty = true;
        }
        Ok(removed)
    }

    pub fn metadata_keys(&self) -> Result<Vec<String>> {
        let inner = self.lock_open()?;
        Ok(inner.record.metadata.keys().cloned().collect())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write all pending attribute changes and the root record, then sync
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock_open()?;
        Self::flush_inner(&mut inner)
    }

    /// Flush, then rewrite the backing store without superseded records
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.lock_open()?;
        Self::flush_inner(&mut inner)?;
        inner.backing.as_mut().ok_or(OffError::StoreClosed)?.compact()
    }

    /// Flush every attribute and release the backing store
    ///
    /// Idempotent. Afterwards the root and every handle obtained from it
    /// fail with `StoreClosed`.
    pub fn close(&self) -> Result<()> {
        // Flip the flag first so handles stop accepting writes; the flush
        // below reaches the storages directly.
        if !self.lifecycle.close() {
            return Ok(());
        }

        let mut inner = self.inner.lock();
        let result = Self::close_inner(&mut inner, &self.config);
        inner.backing = None;
        inner.attributes.clear();

        match &result {
            Ok(()) => info!(uri = %self.uri, "object store closed"),
            Err(e) => error!(uri = %self.uri, error = %e, "object store closed with errors"),
        }
        result
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn status(&self) -> OpenStatus {
        self.status
    }

    /// True when this open initialized the store
    pub fn is_created(&self) -> bool {
        self.status == OpenStatus::Created
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    pub fn uri(&self) -> &StoreUri {
        &self.uri
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn lock_open(&self) -> Result<parking_lot::MutexGuard<'_, RootInner>> {
        let inner = self.inner.lock();
        self.lifecycle.ensure_open()?;
        Ok(inner)
    }

    fn flush_inner(inner: &mut RootInner) -> Result<()> {
        let RootInner {
            backing,
            record,
            record_dirty,
            attributes,
        } = inner;
        let backing = backing.as_mut().ok_or(OffError::StoreClosed)?;

        // One failing attribute does not hold back the others or the root
        // record; the first error is reported once everything was tried.
        let mut failure = None;
        for (id, storage) in attributes.iter() {
            let mut storage = storage.write();

            // Late reversal changes the recorded mode without touching data.
            let mode = storage.mode();
            if record.attributes.get(id) != Some(&mode) {
                record.attributes.insert(*id, mode);
                *record_dirty = true;
            }

            let changes = storage.take_changes();
            if changes.is_empty() {
                continue;
            }
            if let Err(e) = Self::write_changes(&mut **backing, *id, &changes) {
                storage.requeue(&changes);
                error!(attribute = id, error = %e, "failed to flush attribute");
                failure.get_or_insert(e);
                continue;
            }
            debug!(
                attribute = id,
                upserts = changes.upserts.len(),
                deletes = changes.deletes.len(),
                "flushed attribute"
            );
        }

        if *record_dirty {
            backing.set(ROOT_KEY, &record.encode()?)?;
            *record_dirty = false;
        }

        backing.sync()?;
        failure.map_or(Ok(()), Err)
    }

    fn write_changes(
        backing: &mut dyn BackingStore,
        id: AttributeId,
        changes: &PendingChanges,
    ) -> Result<()> {
        for (object, value) in &changes.upserts {
            backing.set(&record::entry_key(id, *object), &bincode::serialize(value)?)?;
        }
        for object in &changes.deletes {
            backing.delete(&record::entry_key(id, *object))?;
        }
        Ok(())
    }

    /// Flush, compact if due, and close the backing store even when the
    /// flush failed
    fn close_inner(inner: &mut RootInner, config: &Config) -> Result<()> {
        let flushed = Self::flush_inner(inner);

        let backing = inner.backing.as_mut().ok_or(OffError::StoreClosed)?;
        if flushed.is_ok()
            && config.compact_on_close
            && backing.dead_ratio() >= config.compaction_threshold
        {
            backing.compact()?;
        }
        let closed = backing.close();
        flushed.and(closed)
    }
}

impl Drop for ObjectStoreRoot {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(uri = %self.uri, error = %e, "failed to close object store on drop");
        }
    }
}
