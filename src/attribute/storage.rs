//! AttributeStorage implementation
//!
//! Forward map plus an optional reverse index for one attribute column.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, info_span};

use crate::error::{OffError, Result};
use crate::value::{AttributeId, ObjectId, Value};

use super::reverse::ReverseIndex;
use super::IndexMode;

/// Index state. The reverse map only exists inside `Reversed`, so the mode
/// and the presence of the map can never disagree.
#[derive(Debug, Clone)]
enum Index {
    ForwardOnly,
    Reversed(ReverseIndex),
}

/// Changes accumulated since the last flush
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PendingChanges {
    pub upserts: Vec<(ObjectId, Value)>,
    pub deletes: Vec<ObjectId>,
}

impl PendingChanges {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Column store for one attribute
///
/// ## Invariants
/// - In `Reversed` mode, `(id, v)` is in the forward map exactly when `id`
///   is in the bucket for `v`.
/// - Every bucket is ascending with no duplicates.
///
/// Forward and reverse maps are private and only `set`, `delete` and
/// `set_reverse` mutate them.
#[derive(Debug, Clone)]
pub struct AttributeStorage {
    id: AttributeId,
    forward: BTreeMap<ObjectId, Value>,
    index: Index,
    /// Ids written or deleted since the last `take_changes`
    dirty: BTreeSet<ObjectId>,
}

impl AttributeStorage {
    /// Create an empty column
    ///
    /// With `is_reversed` every `set` maintains the reverse index
    /// immediately; otherwise that cost is deferred to `set_reverse()`.
    pub fn new(id: AttributeId, is_reversed: bool) -> Self {
        let index = if is_reversed {
            Index::Reversed(ReverseIndex::default())
        } else {
            Index::ForwardOnly
        };
        Self {
            id,
            forward: BTreeMap::new(),
            index,
            dirty: BTreeSet::new(),
        }
    }

    /// Rebuild a column from persisted forward entries (not marked dirty)
    pub(crate) fn restore(
        id: AttributeId,
        mode: IndexMode,
        entries: impl IntoIterator<Item = (ObjectId, Value)>,
    ) -> Self {
        let forward: BTreeMap<ObjectId, Value> = entries.into_iter().collect();
        let index = match mode {
            IndexMode::ForwardOnly => Index::ForwardOnly,
            IndexMode::Reversed => Index::Reversed(ReverseIndex::build(&forward)),
        };
        debug!(attribute = id, entries = forward.len(), ?mode, "restored attribute");
        Self {
            id,
            forward,
            index,
            dirty: BTreeSet::new(),
        }
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Insert or overwrite the value for `id`
    ///
    /// In reversed mode `id` moves from its previous value's bucket to the
    /// bucket for `value`. Setting the same pair again changes nothing.
    pub fn set(&mut self, id: ObjectId, value: impl Into<Value>) {
        let value = value.into();

        if let Index::Reversed(reverse) = &mut self.index {
            match self.forward.get(&id) {
                Some(previous) if *previous == value => return,
                Some(previous) => {
                    reverse.remove(previous, id);
                }
                None => {}
            }
            reverse.insert(value.clone(), id);
        } else if self.forward.get(&id) == Some(&value) {
            return;
        }

        self.forward.insert(id, value);
        self.dirty.insert(id);
    }

    /// Current value for `id`
    pub fn get(&self, id: ObjectId) -> Result<&Value> {
        self.forward.get(&id).ok_or(OffError::KeyNotFound {
            attribute: self.id,
            id,
        })
    }

    /// Ascending ids currently holding `value`
    ///
    /// Reversed: O(log n + k) from the reverse index.
    /// Forward-only: a full scan of the forward map. The scan never builds
    /// the reverse index; only `set_reverse()` does.
    pub fn find(&self, value: &Value) -> Vec<ObjectId> {
        match &self.index {
            Index::Reversed(reverse) => reverse.lookup(value),
            Index::ForwardOnly => self
                .forward
                .iter()
                .filter(|(_, v)| *v == value)
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    /// Switch from forward-only to reversed, building the full reverse index
    ///
    /// One pass over the forward map; O(n log n) and potentially
    /// long-running for large columns. No-op when already reversed. Values
    /// are untouched: `find` answers the same before and after.
    pub fn set_reverse(&mut self) {
        if matches!(self.index, Index::Reversed(_)) {
            return;
        }

        let span = info_span!("set_reverse", attribute = self.id, entries = self.forward.len());
        let _enter = span.enter();

        let reverse = ReverseIndex::build(&self.forward);
        info!(buckets = reverse.bucket_count(), "reverse index materialized");
        self.index = Index::Reversed(reverse);
    }

    /// Remove `id`, returning its last value
    pub fn delete(&mut self, id: ObjectId) -> Result<Value> {
        let value = self.forward.remove(&id).ok_or(OffError::KeyNotFound {
            attribute: self.id,
            id,
        })?;
        if let Index::Reversed(reverse) = &mut self.index {
            reverse.remove(&value, id);
        }
        self.dirty.insert(id);
        Ok(value)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn mode(&self) -> IndexMode {
        match self.index {
            Index::ForwardOnly => IndexMode::ForwardOnly,
            Index::Reversed(_) => IndexMode::Reversed,
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.mode() == IndexMode::Reversed
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.forward.contains_key(&id)
    }

    /// Entries in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Value)> {
        self.forward.iter().map(|(id, v)| (*id, v))
    }

    /// Distinct values with how many ids hold each, in value order
    pub fn value_counts(&self) -> Vec<(Value, usize)> {
        match &self.index {
            Index::Reversed(reverse) => reverse.counts().map(|(v, n)| (v.clone(), n)).collect(),
            Index::ForwardOnly => {
                let mut counts: BTreeMap<&Value, usize> = BTreeMap::new();
                for value in self.forward.values() {
                    *counts.entry(value).or_default() += 1;
                }
                counts.into_iter().map(|(v, n)| (v.clone(), n)).collect()
            }
        }
    }

    // =========================================================================
    // Persistence Support
    // =========================================================================

    /// Drain the ids changed since the last call
    pub(crate) fn take_changes(&mut self) -> PendingChanges {
        let mut changes = PendingChanges::default();
        for id in std::mem::take(&mut self.dirty) {
            match self.forward.get(&id) {
                Some(value) => changes.upserts.push((id, value.clone())),
                None => changes.deletes.push(id),
            }
        }
        changes
    }

    /// Put drained changes back after a failed flush
    pub(crate) fn requeue(&mut self, changes: &PendingChanges) {
        self.dirty.extend(changes.upserts.iter().map(|(id, _)| *id));
        self.dirty.extend(changes.deletes.iter().copied());
    }

    #[cfg(test)]
    pub(crate) fn reverse_index(&self) -> Option<&ReverseIndex> {
        match &self.index {
            Index::Reversed(reverse) => Some(reverse),
            Index::ForwardOnly => None,
        }
    }
}
