//! Reverse index: value → ascending set of object ids

use std::collections::{BTreeMap, BTreeSet};

use crate::value::{ObjectId, Value};

/// Value-keyed buckets of object ids
///
/// Buckets are `BTreeSet`s, so each is ascending and duplicate-free by
/// construction. Empty buckets are never retained.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReverseIndex {
    buckets: BTreeMap<Value, BTreeSet<ObjectId>>,
}

impl ReverseIndex {
    /// Group a forward map's ids by value in one pass
    pub(crate) fn build<'a>(forward: impl IntoIterator<Item = (&'a ObjectId, &'a Value)>) -> Self {
        let mut buckets: BTreeMap<Value, BTreeSet<ObjectId>> = BTreeMap::new();
        for (id, value) in forward {
            match buckets.get_mut(value) {
                Some(bucket) => {
                    bucket.insert(*id);
                }
                None => {
                    buckets.insert(value.clone(), BTreeSet::from([*id]));
                }
            }
        }
        Self { buckets }
    }

    pub(crate) fn insert(&mut self, value: Value, id: ObjectId) {
        self.buckets.entry(value).or_default().insert(id);
    }

    /// Remove `id` from `value`'s bucket, dropping the bucket if it empties
    pub(crate) fn remove(&mut self, value: &Value, id: ObjectId) -> bool {
        let Some(bucket) = self.buckets.get_mut(value) else {
            return false;
        };
        let removed = bucket.remove(&id);
        if bucket.is_empty() {
            self.buckets.remove(value);
        }
        removed
    }

    pub(crate) fn lookup(&self, value: &Value) -> Vec<ObjectId> {
        self.buckets
            .get(value)
            .map(|bucket| bucket.iter().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Distinct values with the number of ids holding each
    pub(crate) fn counts(&self) -> impl Iterator<Item = (&Value, usize)> {
        self.buckets.iter().map(|(v, ids)| (v, ids.len()))
    }

    #[cfg(test)]
    pub(crate) fn buckets(&self) -> &BTreeMap<Value, BTreeSet<ObjectId>> {
        &self.buckets
    }
}
