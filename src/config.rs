//! Configuration for offstore
//!
//! Centralized configuration with sensible defaults.

use crate::error::{OffError, Result};

/// Configuration for opening an [`ObjectStoreRoot`](crate::ObjectStoreRoot)
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Store Location
    // -------------------------------------------------------------------------
    /// Backing store URI
    ///   file:<path>     file-backed log (a bare path means the same)
    ///   memory:[name]   process-local, nothing persists past close
    pub uri: String,

    /// Create the backing store (and an empty root record) when absent
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// How often the backing log is fsynced
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Compaction
    // -------------------------------------------------------------------------
    /// Rewrite the backing log on close when it carries superseded records
    pub compact_on_close: bool,

    /// Fraction of dead records (0.0..=1.0) required before close compacts
    pub compaction_threshold: f64,
}

/// Backing log sync strategy
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncStrategy {
    /// fsync after every record (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records
    EveryNEntries { count: usize },

    /// fsync only on explicit flush/close
    OnFlush,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: "file:./offstore.db".to_string(),
            create_if_missing: false,
            sync_strategy: SyncStrategy::OnFlush,
            compact_on_close: true,
            compaction_threshold: 0.5,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check value ranges that the type system can't express
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.compaction_threshold) {
            return Err(OffError::Config(format!(
                "compaction_threshold must be within 0.0..=1.0, got {}",
                self.compaction_threshold
            )));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(OffError::Config(
                "EveryNEntries sync strategy needs a count above zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing store URI
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.config.uri = uri.into();
        self
    }

    /// Create the store when it does not exist yet
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the backing log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable close-time compaction
    pub fn compact_on_close(mut self, enabled: bool) -> Self {
        self.config.compact_on_close = enabled;
        self
    }

    /// Set the dead-record fraction that triggers close-time compaction
    pub fn compaction_threshold(mut self, threshold: f64) -> Self {
        self.config.compaction_threshold = threshold;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
