//! Root record and backing key layout
//!
//! ```text
//!   key                                   value
//!   ─────────────────────────────────────  ─────────────────────
//!   0x00 "root"                            bincode(RootRecord)
//!   'a' | attr: u32 BE | object: u64 BE    bincode(Value)
//! ```
//!
//! Big-endian ids keep one attribute's entries contiguous and in ascending
//! object-id order under the backing store's byte ordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attribute::IndexMode;
use crate::error::{OffError, Result};
use crate::value::{AttributeId, ObjectId};

pub(crate) const ROOT_KEY: &[u8] = b"\x00root";

const ATTRIBUTE_TAG: u8 = b'a';

/// Tag (1) + AttributeId (4)
const ATTRIBUTE_PREFIX_LEN: usize = 5;

/// Prefix (5) + ObjectId (8)
const ENTRY_KEY_LEN: usize = 13;

/// Current root record layout
pub(crate) const ROOT_FORMAT_VERSION: u16 = 1;

/// The single persisted root of a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RootRecord {
    pub format_version: u16,

    /// Every attribute ever registered, with its current mode
    pub attributes: BTreeMap<AttributeId, IndexMode>,

    /// Store-wide bookkeeping owned by higher layers
    pub metadata: BTreeMap<String, String>,
}

impl RootRecord {
    pub fn new() -> Self {
        Self {
            format_version: ROOT_FORMAT_VERSION,
            attributes: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let record: RootRecord = bincode::deserialize(bytes)
            .map_err(|e| OffError::Corruption(format!("undecodable root record: {}", e)))?;
        if record.format_version != ROOT_FORMAT_VERSION {
            return Err(OffError::Corruption(format!(
                "unsupported root record version: {}",
                record.format_version
            )));
        }
        Ok(record)
    }
}

pub(crate) fn attribute_prefix(attribute: AttributeId) -> [u8; ATTRIBUTE_PREFIX_LEN] {
    let mut prefix = [0u8; ATTRIBUTE_PREFIX_LEN];
    prefix[0] = ATTRIBUTE_TAG;
    prefix[1..].copy_from_slice(&attribute.to_be_bytes());
    prefix
}

pub(crate) fn entry_key(attribute: AttributeId, id: ObjectId) -> [u8; ENTRY_KEY_LEN] {
    let mut key = [0u8; ENTRY_KEY_LEN];
    key[..ATTRIBUTE_PREFIX_LEN].copy_from_slice(&attribute_prefix(attribute));
    key[ATTRIBUTE_PREFIX_LEN..].copy_from_slice(&id.to_be_bytes());
    key
}

/// Extract the object id from an entry key
pub(crate) fn decode_entry_key(key: &[u8]) -> Result<ObjectId> {
    if key.len() != ENTRY_KEY_LEN || key[0] != ATTRIBUTE_TAG {
        return Err(OffError::Corruption(format!("malformed entry key {:?}", key)));
    }
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[ATTRIBUTE_PREFIX_LEN..]);
    Ok(ObjectId::from_be_bytes(id))
}
