//! File-backed store
//!
//! Append-only log of CRC-framed records, replayed into an ordered in-memory
//! map on open. A torn final frame (crash mid-append) is truncated during
//! replay; everything before it is kept. A bad frame with data after it is
//! corruption and the file is left untouched.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::SyncStrategy;
use crate::error::{OffError, Result};

use super::record::{self, Frame, LogRecord, FILE_HEADER_SIZE};
use super::BackingStore;

/// What replay found when the file was opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Valid records applied
    pub records: u64,

    /// Bytes cut from the end of the file (torn or corrupt tail)
    pub truncated_bytes: u64,
}

/// Append-only file store
pub struct FileStore {
    /// Location of the log file
    path: PathBuf,

    /// Append handle; `None` once closed, or after compaction failed to
    /// reopen the file (the next write retries)
    writer: Option<BufWriter<File>>,

    closed: bool,

    /// Live view of the log
    entries: BTreeMap<Vec<u8>, Vec<u8>>,

    /// Frames currently in the log (live + superseded + deletes)
    records: u64,

    /// Frames written since the last fsync
    unsynced: usize,

    sync_strategy: SyncStrategy,

    replay: ReplayStats,
}

impl FileStore {
    /// Open the log at `path`
    ///
    /// Returns the store and whether the file was created by this call.
    pub fn open(path: &Path, create: bool, sync_strategy: SyncStrategy) -> Result<(Self, bool)> {
        let created = if path.exists() {
            false
        } else if create {
            Self::create_file(path)?;
            true
        } else {
            return Err(OffError::StoreNotFound(path.display().to_string()));
        };

        let (entries, replay) = Self::replay(path)?;

        let file = OpenOptions::new().append(true).open(path)?;

        debug!(
            path = %path.display(),
            created,
            keys = entries.len(),
            records = replay.records,
            "opened backing file"
        );

        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Some(BufWriter::new(file)),
                closed: false,
                entries,
                records: replay.records,
                unsynced: 0,
                sync_strategy,
                replay,
            },
            created,
        ))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames currently in the log, dead ones included
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Replay statistics from open
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn create_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&record::file_header())?;
        file.sync_all()?;
        Ok(())
    }

    /// Rebuild the live map from the log, truncating a torn final frame
    fn replay(path: &Path) -> Result<(BTreeMap<Vec<u8>, Vec<u8>>, ReplayStats)> {
        let bytes = fs::read(path)?;
        let mut entries = BTreeMap::new();
        let mut stats = ReplayStats::default();

        // A zero-length file is a store whose creation was interrupted
        // before the header landed.
        if bytes.is_empty() {
            let mut file = OpenOptions::new().write(true).open(path)?;
            file.write_all(&record::file_header())?;
            file.sync_all()?;
            return Ok((entries, stats));
        }

        record::check_file_header(&bytes)?;

        let mut pos = FILE_HEADER_SIZE;
        while pos < bytes.len() {
            match record::read_frame(&bytes[pos..])? {
                Frame::Complete(rec, consumed) => {
                    Self::apply(&mut entries, rec);
                    stats.records += 1;
                    pos += consumed;
                }
                Frame::Incomplete => break,
                Frame::ChecksumMismatch(len) if pos + len == bytes.len() => break,
                Frame::ChecksumMismatch(len) => {
                    return Err(OffError::Corruption(format!(
                        "checksum mismatch at offset {} with {} bytes following",
                        pos,
                        bytes.len() - pos - len
                    )));
                }
            }
        }

        if pos < bytes.len() {
            stats.truncated_bytes = (bytes.len() - pos) as u64;
            warn!(
                path = %path.display(),
                offset = pos,
                discarded = stats.truncated_bytes,
                "truncating torn tail of backing file"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(pos as u64)?;
            file.sync_all()?;
        }

        Ok((entries, stats))
    }

    fn apply(entries: &mut BTreeMap<Vec<u8>, Vec<u8>>, rec: LogRecord) {
        match rec {
            LogRecord::Set { key, value } => {
                entries.insert(key, value);
            }
            LogRecord::Delete { key } => {
                entries.remove(&key);
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(OffError::StoreClosed);
        }
        Ok(())
    }

    /// The append handle, reopened if compaction left none behind
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.ensure_open()?;
        if self.writer.is_none() {
            let file = OpenOptions::new().append(true).open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }
        self.writer.as_mut().ok_or(OffError::StoreClosed)
    }

    /// Append one frame and honour the sync strategy
    fn append(&mut self, rec: &LogRecord) -> Result<()> {
        let frame = record::encode_frame(rec)?;
        self.writer()?.write_all(&frame)?;
        self.records += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count,
            SyncStrategy::OnFlush => false,
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    /// Write every live entry as a fresh log at `path`
    fn write_compacted(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&record::file_header())?;
        for (key, value) in &self.entries {
            let frame = record::encode_frame(&LogRecord::Set {
                key: key.clone(),
                value: value.clone(),
            })?;
            out.write_all(&frame)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    }

    fn discard_compaction(tmp_path: &Path) {
        if let Err(e) = fs::remove_file(tmp_path) {
            warn!(path = %tmp_path.display(), error = %e, "failed to remove compaction file");
        }
    }

    fn compaction_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".compact");
        self.path.with_file_name(name)
    }
}

impl BackingStore for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(&LogRecord::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        if !self.entries.contains_key(key) {
            return Ok(false);
        }
        self.append(&LogRecord::Delete { key: key.to_vec() })?;
        self.entries.remove(key);
        Ok(true)
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

    fn dead_ratio(&self) -> f64 {
        if self.records == 0 {
            return 0.0;
        }
        let dead = self.records.saturating_sub(self.entries.len() as u64);
        dead as f64 / self.records as f64
    }

    fn sync(&mut self) -> Result<()> {
        let writer = self.writer()?;
        writer.flush()?;
        writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Rewrite live entries into a fresh file and rename it into place
    fn compact(&mut self) -> Result<()> {
        self.sync()?;

        let before = self.records;
        let tmp_path = self.compaction_path();
        if let Err(e) = self.write_compacted(&tmp_path) {
            Self::discard_compaction(&tmp_path);
            return Err(e);
        }

        // Release the old append handle before the rename replaces its file.
        // On failure the original log is still in place and `writer()`
        // reopens whichever file the path names.
        self.writer = None;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            Self::discard_compaction(&tmp_path);
            self.writer()?;
            return Err(e.into());
        }
        self.records = self.entries.len() as u64;
        self.unsynced = 0;
        self.writer()?;

        info!(
            path = %self.path.display(),
            records_before = before,
            records_after = self.records,
            "compacted backing file"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let synced = self.sync();
        self.writer = None;
        self.closed = true;
        synced?;
        debug!(path = %self.path.display(), "closed backing file");
        Ok(())
    }
}
