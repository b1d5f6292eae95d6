// src/auditlog.rs
//
// =============================================================================
// ROBOGRAPH: DURABLE AUDIT LOG (v 0.1 )
// =============================================================================
//
// Append-only safety audit trail. Runtime decisions (blocks, completions)
// are framed as [MAGIC][CRC32][LEN][bincode record] so the file survives
// partial writes: the reader re-synchronizes by scanning forward for the
// next magic marker and skips records whose checksum does not match.
//
// The payload travels as raw JSON bytes inside the bincode container, so
// event shapes can evolve without a schema migration.

use anyhow::{anyhow, Context, Result};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

// "RBLG" in ASCII.
const MAGIC_BYTES: u32 = 0x52424C47;

// Guard against implausible length fields from corrupted headers.
const MAX_RECORD_SIZE: u32 = 16 * 1024 * 1024;

// Frame header: magic + crc + len.
const HEADER_LEN: u64 = 12;

/// The high-level event the application reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts_ms: i64,
    pub kind: String,
    pub payload: Value,
}

/// On-disk container; payload kept as JSON bytes for bincode friendliness.
#[derive(Serialize, Deserialize)]
struct DiskRecord {
    ts_ms: i64,
    kind: String,
    payload_json: Vec<u8>,
}

/// A read event plus its file position.
#[derive(Debug, Clone)]
pub struct AuditEnvelope {
    pub offset: u64,
    pub next_offset: u64,
    pub event: AuditEvent,
}

// =============================================================================
// WRITER
// =============================================================================

pub struct AuditLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl AuditLogWriter {
    /// Opens the log in append mode, creating parent directories if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log writer: {path:?}"))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Appends one event and returns the offset its frame started at.
    pub fn append(&mut self, kind: &str, payload: Value) -> Result<u64> {
        let record = DiskRecord {
            ts_ms: chrono::Utc::now().timestamp_millis(),
            kind: kind.to_string(),
            payload_json: serde_json::to_vec(&payload)
                .context("Failed to serialize audit payload")?,
        };

        let bytes = bincode::serialize(&record).context("Bincode serialization failed")?;
        let len = bytes.len() as u32;
        if len > MAX_RECORD_SIZE {
            return Err(anyhow!("Audit event exceeds record size limit: {len} bytes"));
        }

        let mut hasher = Hasher::new();
        hasher.update(&bytes);
        let crc = hasher.finalize();

        let offset = self.writer.stream_position().unwrap_or(0);
        self.writer.write_all(&MAGIC_BYTES.to_le_bytes())?;
        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;

        Ok(offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// READER
// =============================================================================

pub struct AuditLogReader {
    reader: BufReader<File>,
    cursor: u64,
    path: PathBuf,
}

impl AuditLogReader {
    /// Opens a log for reading; a missing file is created empty so tailing
    /// can start immediately.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            OpenOptions::new().create(true).append(true).open(&path)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log reader: {path:?}"))?;

        Ok(Self {
            reader: BufReader::new(file),
            cursor: 0,
            path,
        })
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.cursor = offset;
        Ok(())
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next valid record, or None at end of file. Corrupt spans
    /// are skipped by scanning forward for the next magic marker.
    pub fn next_event(&mut self) -> Result<Option<AuditEnvelope>> {
        loop {
            let start_pos = self.cursor;
            self.reader.seek(SeekFrom::Start(start_pos))?;

            let mut magic_buf = [0u8; 4];
            match self.reader.read_exact(&mut magic_buf) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            if u32::from_le_bytes(magic_buf) != MAGIC_BYTES {
                log::warn!(
                    "Audit log corruption at offset {} in {:?}; resynchronizing",
                    start_pos,
                    self.path
                );
                match self.scan_for_magic(start_pos + 1)? {
                    Some(next) => {
                        self.cursor = next;
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let mut meta_buf = [0u8; 8];
            if self.reader.read_exact(&mut meta_buf).is_err() {
                return Ok(None); // Partial header at EOF.
            }
            let expected_crc = u32::from_le_bytes(meta_buf[0..4].try_into()?);
            let len = u32::from_le_bytes(meta_buf[4..8].try_into()?);

            if len > MAX_RECORD_SIZE {
                log::error!("Implausible audit record length {len} at {start_pos}");
                match self.scan_for_magic(start_pos + 1)? {
                    Some(next) => {
                        self.cursor = next;
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let mut payload = vec![0u8; len as usize];
            if self.reader.read_exact(&mut payload).is_err() {
                return Ok(None); // Partial payload write.
            }

            let mut hasher = Hasher::new();
            hasher.update(&payload);
            if hasher.finalize() != expected_crc {
                log::error!("Audit log CRC mismatch at {start_pos}");
                match self.scan_for_magic(start_pos + 1)? {
                    Some(next) => {
                        self.cursor = next;
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            let next_offset = start_pos + HEADER_LEN + len as u64;

            let record: DiskRecord = match bincode::deserialize(&payload) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("Audit record decode failed at {start_pos}: {e}");
                    self.cursor = next_offset;
                    continue;
                }
            };
            let payload_value: Value = match serde_json::from_slice(&record.payload_json) {
                Ok(v) => v,
                Err(e) => {
                    log::error!("Audit payload JSON corrupt at {start_pos}: {e}");
                    self.cursor = next_offset;
                    continue;
                }
            };

            self.cursor = next_offset;
            return Ok(Some(AuditEnvelope {
                offset: start_pos,
                next_offset,
                event: AuditEvent {
                    ts_ms: record.ts_ms,
                    kind: record.kind,
                    payload: payload_value,
                },
            }));
        }
    }

    /// Byte-wise forward scan for the magic marker; returns its offset.
    fn scan_for_magic(&mut self, start_scan: u64) -> Result<Option<u64>> {
        self.reader.seek(SeekFrom::Start(start_scan))?;

        let mut window = [0u8; 4];
        let mut filled = 0usize;
        let mut pos = start_scan;
        let mut byte = [0u8; 1];

        loop {
            if filled == 4 {
                if u32::from_le_bytes(window) == MAGIC_BYTES {
                    return Ok(Some(pos - 4));
                }
                window.rotate_left(1);
                filled = 3;
            }
            if self.reader.read(&mut byte)? == 0 {
                return Ok(None);
            }
            window[filled] = byte[0];
            filled += 1;
            pos += 1;
        }
    }
}
