//! Attribute Module
//!
//! Per-attribute column storage queried in both directions.
//!
//! ## Responsibilities
//! - Forward map: object id → value
//! - Reverse index: value → ascending object ids
//! - Eager maintenance of the reverse index, or a deferred one-shot build
//!
//! ## Mode State Machine
//! ```text
//!   ┌─────────────┐   set_reverse()   ┌──────────┐
//!   │ ForwardOnly │ ────────────────► │ Reversed │
//!   └─────────────┘                   └──────────┘
//! ```
//! There is no transition back. A forward-only `find` scans the forward map
//! and never builds the index as a side effect.

mod reverse;
mod storage;

use serde::{Deserialize, Serialize};

pub use storage::AttributeStorage;
pub(crate) use storage::PendingChanges;

/// Which views of the column are maintained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Only the forward map; `find` is a linear scan
    ForwardOnly,

    /// Forward map plus the reverse index, updated on every write
    Reversed,
}

impl IndexMode {
    pub fn from_reversed(reversed: bool) -> Self {
        if reversed {
            IndexMode::Reversed
        } else {
            IndexMode::ForwardOnly
        }
    }
}
