//! In-memory store
//!
//! Same contract as the file store minus durability. Nothing pre-exists a
//! memory store, so opening one without `create_if_missing` fails.

use std::collections::BTreeMap;

use crate::error::{OffError, Result};

use super::BackingStore;

/// Process-local store backed by a BTreeMap
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    closed: bool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Open a named memory store
    pub fn open(name: &str, create: bool) -> Result<Self> {
        if !create {
            return Err(OffError::StoreNotFound(format!("memory:{}", name)));
        }
        Ok(Self::new(name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(OffError::StoreClosed);
        }
        Ok(())
    }
}

impl BackingStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.entries.remove(key).is_some())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn sync(&mut self) -> Result<()> {
        self.ensure_open()
    }

    fn compact(&mut self) -> Result<()> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
