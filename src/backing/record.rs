//! Backing log record framing
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ File header                             │
//! │   Magic: "OFFS" (4) | Version: u16 (2)  │
//! ├─────────────────────────────────────────┤
//! │ Frame 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode(record) │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! All integers little-endian. The CRC covers the payload only.

use serde::{Deserialize, Serialize};

use crate::error::{OffError, Result};

/// Magic bytes identifying an offstore backing file
pub(crate) const MAGIC: &[u8; 4] = b"OFFS";

/// Current backing file format version
pub(crate) const VERSION: u16 = 1;

/// Magic (4) + Version (2)
pub const FILE_HEADER_SIZE: usize = 6;

/// Len (4) + CRC (4)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a frame may carry
///
/// Writers refuse anything bigger; a length field above it on replay is
/// corruption.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Room left in a frame for the record tag, length prefixes and entry key
const RECORD_OVERHEAD: usize = 64;

/// Largest encoded value that still fits in one frame
pub const MAX_VALUE_SIZE: usize = MAX_PAYLOAD_SIZE - RECORD_OVERHEAD;

/// A single mutation in the backing log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Outcome of reading one frame from a buffer
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    /// A valid record and the number of bytes it occupied
    Complete(LogRecord, usize),

    /// The buffer ends mid-frame (torn write)
    Incomplete,

    /// The payload does not match its checksum; carries the frame length
    ChecksumMismatch(usize),
}

pub(crate) fn file_header() -> [u8; FILE_HEADER_SIZE] {
    let mut header = [0u8; FILE_HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Validate a file header
pub(crate) fn check_file_header(bytes: &[u8]) -> Result<()> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(OffError::Corruption(format!(
            "backing file header truncated: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != MAGIC {
        return Err(OffError::Corruption(format!(
            "invalid magic: expected OFFS, got {:?}",
            &bytes[0..4]
        )));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(OffError::Corruption(format!(
            "unsupported backing file version: {}",
            version
        )));
    }
    Ok(())
}

/// Encode a record into a complete frame
///
/// Fails with `RecordTooLarge` when the payload exceeds `MAX_PAYLOAD_SIZE`,
/// since replay could not tell such a frame from garbage.
pub(crate) fn encode_frame(record: &LogRecord) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record)?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len as usize <= MAX_PAYLOAD_SIZE)
        .ok_or(OffError::RecordTooLarge {
            size: payload.len() as u64,
            max: MAX_PAYLOAD_SIZE as u64,
        })?;
    let crc = crc32fast::hash(&payload);

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Read one frame from the start of `buf`
///
/// A length above `MAX_PAYLOAD_SIZE`, or a payload that passes its
/// checksum but fails to decode, is real corruption and surfaces as an
/// error.
pub(crate) fn read_frame(buf: &[u8]) -> Result<Frame> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Ok(Frame::Incomplete);
    }

    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let crc = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);

    if len > MAX_PAYLOAD_SIZE {
        return Err(OffError::Corruption(format!(
            "frame length {} exceeds limit {}",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    let end = FRAME_HEADER_SIZE + len;
    if buf.len() < end {
        return Ok(Frame::Incomplete);
    }

    let payload = &buf[FRAME_HEADER_SIZE..end];
    if crc32fast::hash(payload) != crc {
        return Ok(Frame::ChecksumMismatch(end));
    }

    let record: LogRecord = bincode::deserialize(payload)
        .map_err(|e| OffError::Corruption(format!("undecodable log record: {}", e)))?;
    Ok(Frame::Complete(record, end))
}
