//! Append-only log for durability
//!
//! Every measurement the engine accepts is eventually written here, and the
//! whole file is replayed into memory on open. There is no compaction: the
//! log is the complete history of the store.
//!
//! Format per entry, one per line:
//! - base64 (standard alphabet) of the measurement's JSON encoding
//! - `\n`
//!
//! Base64 keeps every control byte, including the line delimiter, out of the
//! payload. A line that fails to decode aborts recovery; nothing is skipped.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::Measurement;

/// Sync strategy for log writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalSyncMode {
    /// Fsync after every flush (safest)
    #[default]
    OnFlush,
    /// No fsync, rely on OS (fastest, risk of loss on power failure)
    None,
}

/// Append-only measurement log
#[derive(Debug)]
pub struct WriteAheadLog {
    /// File handle, opened for read + append
    file: File,
    /// Path to log file
    path: PathBuf,
    /// Number of entries in the file
    entry_count: u64,
    /// Sync mode
    sync_mode: WalSyncMode,
}

impl WriteAheadLog {
    /// Open or create a log file
    ///
    /// Fails if the file cannot be opened for both reading and appending.
    pub fn open(path: impl AsRef<Path>, sync_mode: WalSyncMode) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            file,
            path,
            entry_count: 0,
            sync_mode,
        })
    }

    /// Read every entry from the start of the file, in order
    ///
    /// Each decoded measurement is handed to `apply`. Stops at the first
    /// undecodable line or the first error from `apply`. Blank lines are
    /// skipped. Returns the number of entries read.
    pub fn recover<F>(&mut self, mut apply: F) -> StorageResult<u64>
    where
        F: FnMut(usize, Measurement) -> StorageResult<()>,
    {
        (&self.file).seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        let mut buf = Vec::new();
        let mut line_no = 0usize;
        let mut count = 0u64;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break; // EOF
            }
            line_no += 1;

            let line = trim_line_end(&buf);
            if line.is_empty() {
                continue;
            }

            let measurement = decode_line(line).map_err(|reason| StorageError::Corruption {
                line: line_no,
                reason,
            })?;

            apply(line_no, measurement)?;
            count += 1;
        }

        self.entry_count = count;
        Ok(count)
    }

    /// Append measurements, one line each, in a single write
    pub fn append_batch(&mut self, measurements: &[Arc<Measurement>]) -> StorageResult<()> {
        if measurements.is_empty() {
            return Ok(());
        }

        let mut out = String::new();
        for m in measurements {
            out.push_str(&encode_line(m)?);
            out.push('\n');
        }

        let sync = self.sync_mode == WalSyncMode::OnFlush;
        self.append_or_rollback(out.as_bytes(), |file, bytes| {
            file.write_all(bytes)?;
            if sync {
                file.sync_data()?;
            }
            Ok(())
        })?;

        self.entry_count += measurements.len() as u64;
        Ok(())
    }

    /// Run `write` at the end of the file, all or nothing
    ///
    /// If `write` fails, whatever part of `bytes` reached the file is cut off
    /// again, so a retry starts on a line boundary and nothing is logged twice.
    fn append_or_rollback<F>(&mut self, bytes: &[u8], write: F) -> StorageResult<()>
    where
        F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        let start = self.file.metadata()?.len();

        if let Err(err) = write(&mut self.file, bytes) {
            if let Err(rollback) = self.file.set_len(start) {
                tracing::warn!(
                    path = %self.path.display(),
                    length = start,
                    error = %rollback,
                    "Failed to roll back partial log write"
                );
            }
            return Err(err.into());
        }

        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of entries in the log
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the file size
    pub fn file_size(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }
}

/// Encode a measurement as a log line, without the trailing newline
pub fn encode_line(measurement: &Measurement) -> StorageResult<String> {
    let json = serde_json::to_vec(measurement)?;
    Ok(STANDARD.encode(json))
}

/// Decode a log line, without its trailing newline
fn decode_line(line: &[u8]) -> Result<Measurement, String> {
    let json = STANDARD
        .decode(line)
        .map_err(|e| format!("invalid base64: {}", e))?;

    serde_json::from_slice(&json).map_err(|e| format!("invalid measurement: {}", e))
}

fn trim_line_end(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
