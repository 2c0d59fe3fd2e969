//! # offstore
//!
//! A persistent per-attribute column store with:
//! - Forward lookups (object id → value)
//! - Reverse lookups (value → ascending object ids)
//! - Reverse indexes maintained eagerly, or built once on demand
//! - A single persisted root record per backing file
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ObjectStoreRoot                          │
//! │         (root record, attribute registry, lifecycle)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ attribute(id, reversed_hint)
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Attribute  │   ...    │  Attribute  │
//!   │  (RwLock)   │          │  (RwLock)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │  forward ⇄ reverse     │
//!          └────────────┬───────────┘
//!                       │ flush / close
//!                       ▼
//!               ┌───────────────┐
//!               │ BackingStore  │
//!               │ (file/memory) │
//!               └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod value;

pub mod backing;
pub mod attribute;
pub mod root;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{OffError, Result};
pub use config::{Config, SyncStrategy};
pub use value::{AttributeId, ObjectId, Value};
pub use attribute::{AttributeStorage, IndexMode};
pub use root::{Attribute, ObjectStoreRoot, OpenStatus};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of offstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
