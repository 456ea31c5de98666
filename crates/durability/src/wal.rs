//! Append-only WAL writer/reader over a single file.
//!
//! No segment rotation: the reference substrate is in-memory and meant for
//! tests and embedding, not multi-terabyte workloads, so one growing file is
//! enough. `write_flush` (spec §6) maps directly onto `File::sync_data`.

use crate::record::WalRecord;
use polykv_core::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends [`WalRecord`]s to a single on-disk log file.
pub struct WalWriter {
    path: PathBuf,
    file: BufWriter<File>,
}

impl WalWriter {
    /// Open (creating if needed) the WAL file at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::substrate(format!("opening WAL {}: {e}", path.display())))?;
        Ok(WalWriter { path, file: BufWriter::new(file) })
    }

    /// Append one record. When `flush` is set, forces a durability barrier
    /// (buffered writer flush + `fsync`) before returning, matching the
    /// `write_flush` option (spec §6).
    pub fn append(&mut self, record: &WalRecord, flush: bool) -> Result<()> {
        record
            .write_to(&mut self.file)
            .map_err(|e| Error::substrate(format!("WAL append failed: {e}")))?;
        if flush {
            self.sync()?;
        }
        Ok(())
    }

    /// Force a durability barrier without appending a record.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::substrate(format!("WAL flush failed: {e}")))?;
        self.file
            .get_ref()
            .sync_data()
            .map_err(|e| Error::substrate(format!("WAL fsync failed: {e}")))?;
        tracing::debug!(path = %self.path.display(), "wal fsync");
        Ok(())
    }
}

/// Reads [`WalRecord`]s from a WAL file in order, for crash recovery replay.
pub struct WalReader {
    reader: Option<BufReader<File>>,
}

impl WalReader {
    /// Open the WAL file at `path` for sequential replay. Missing files
    /// behave as an empty log (a database that has never flushed has
    /// nothing to recover).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(f) => Ok(WalReader { reader: Some(BufReader::new(f)) }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(WalReader { reader: None }),
            Err(e) => Err(Error::substrate(format!("opening WAL {}: {e}", path.display()))),
        }
    }

    /// Replay every record still in the log, in commit order. A trailing
    /// torn record (truncated mid-write by a crash) is treated as the end
    /// of the durable log rather than a hard error, matching standard WAL
    /// recovery behavior: whatever made it past the last full fsync counts.
    pub fn replay_all(mut self) -> Result<Vec<WalRecord>> {
        let mut out = Vec::new();
        let Some(reader) = self.reader.as_mut() else {
            return Ok(out);
        };
        loop {
            match WalRecord::read_from(reader) {
                Ok(Some(rec)) => out.push(rec),
                Ok(None) => break,
                Err(_) => break,
            }
        }
        Ok(out)
    }
}
