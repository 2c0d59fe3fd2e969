//! Attribute handles
//!
//! A handle is a shared reference to the one live `AttributeStorage` a root
//! keeps per attribute id. Every call checks the root's closed flag while
//! holding the storage lock, so nothing slips in after `close()` has begun.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::attribute::{AttributeStorage, IndexMode};
use crate::backing::MAX_VALUE_SIZE;
use crate::error::{OffError, Result};
use crate::value::{AttributeId, ObjectId, Value};

/// Root lifecycle state shared with every handle
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    closed: AtomicBool,
}

impl Lifecycle {
    pub fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(OffError::StoreClosed);
        }
        Ok(())
    }

    /// Mark closed. Returns `false` if it already was.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Handle to one attribute column of an open root
///
/// Cheap to clone; clones share the same storage. Reads take a shared lock,
/// writes an exclusive one.
#[derive(Debug, Clone)]
pub struct Attribute {
    id: AttributeId,
    storage: Arc<RwLock<AttributeStorage>>,
    lifecycle: Arc<Lifecycle>,
}

impl Attribute {
    pub(crate) fn new(
        id: AttributeId,
        storage: Arc<RwLock<AttributeStorage>>,
        lifecycle: Arc<Lifecycle>,
    ) -> Self {
        Self {
            id,
            storage,
            lifecycle,
        }
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    /// Insert or overwrite the value for `id`
    ///
    /// Values whose encoding exceeds `MAX_VALUE_SIZE` cannot be persisted
    /// and are refused with `RecordTooLarge`.
    pub fn set(&self, id: ObjectId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let mut storage = self.write()?;
        let size = bincode::serialized_size(&value)?;
        if size > MAX_VALUE_SIZE as u64 {
            return Err(OffError::RecordTooLarge {
                size,
                max: MAX_VALUE_SIZE as u64,
            });
        }
        storage.set(id, value);
        Ok(())
    }

    /// Current value for `id`; `KeyNotFound` if absent
    pub fn get(&self, id: ObjectId) -> Result<Value> {
        self.read()?.get(id).cloned()
    }

    /// Ascending ids currently holding `value`
    pub fn find(&self, value: &Value) -> Result<Vec<ObjectId>> {
        Ok(self.read()?.find(value))
    }

    /// Build the reverse index if it isn't maintained yet
    ///
    /// Holds the exclusive lock for the whole O(n log n) build.
    pub fn set_reverse(&self) -> Result<()> {
        self.write()?.set_reverse();
        Ok(())
    }

    /// Remove `id`, returning its last value
    pub fn delete(&self, id: ObjectId) -> Result<Value> {
        self.write()?.delete(id)
    }

    pub fn mode(&self) -> Result<IndexMode> {
        Ok(self.read()?.mode())
    }

    pub fn is_reversed(&self) -> Result<bool> {
        Ok(self.read()?.is_reversed())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    pub fn contains(&self, id: ObjectId) -> Result<bool> {
        Ok(self.read()?.contains(id))
    }

    /// Snapshot of all entries in ascending id order
    pub fn entries(&self) -> Result<Vec<(ObjectId, Value)>> {
        Ok(self.read()?.iter().map(|(id, v)| (id, v.clone())).collect())
    }

    /// Distinct values with how many ids hold each
    pub fn value_counts(&self) -> Result<Vec<(Value, usize)>> {
        Ok(self.read()?.value_counts())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read(&self) -> Result<RwLockReadGuard<'_, AttributeStorage>> {
        let guard = self.storage.read();
        self.lifecycle.ensure_open()?;
        Ok(guard)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AttributeStorage>> {
        let guard = self.storage.write();
        self.lifecycle.ensure_open()?;
        Ok(guard)
    }
}
