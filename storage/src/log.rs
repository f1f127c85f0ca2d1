//! Append-only persistence log
//!
//! Each record is a fixed header followed by the key and value bytes:
//!
//! ```text
//! kind: u8 | expires_at: u64 LE | key_len: u32 LE | val_len: u32 LE | key | value
//! ```
//!
//! `expires_at` is a Unix timestamp in seconds, 0 for no expiry. Delete
//! records carry an empty value. A record cut short at the end of the file
//! (a torn write) is dropped on open; anything else malformed is corruption.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cachebench_core::CacheError;

/// File name of the log inside the persistence directory
pub const LOG_FILE_NAME: &str = "cache.log";

const KIND_SET: u8 = 1;
const KIND_DEL: u8 = 2;
const HEADER_LEN: usize = 1 + 8 + 4 + 4;

/// One logged mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogRecord {
    Set {
        key: String,
        value: Vec<u8>,
        expires_at: u64,
    },
    Del {
        key: String,
    },
}

impl LogRecord {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), CacheError> {
        let (kind, key, value, expires_at) = match self {
            LogRecord::Set {
                key,
                value,
                expires_at,
            } => (KIND_SET, key, value.as_slice(), *expires_at),
            LogRecord::Del { key } => (KIND_DEL, key, &[][..], 0),
        };

        buf.reserve(HEADER_LEN + key.len() + value.len());
        buf.push(kind);
        buf.extend_from_slice(&expires_at.to_le_bytes());
        buf.extend_from_slice(&len_u32(key.len())?.to_le_bytes());
        buf.extend_from_slice(&len_u32(value.len())?.to_le_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(value);
        Ok(())
    }
}

fn len_u32(len: usize) -> Result<u32, CacheError> {
    u32::try_from(len)
        .map_err(|_| CacheError::Corrupt(format!("record field of {len} bytes is too large")))
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Decode every complete record in `buf`
///
/// Returns the records and the length of the valid prefix. Only a record
/// with a well-formed header may be cut short, and only at the end of `buf`.
pub(crate) fn decode_records(buf: &[u8]) -> Result<(Vec<LogRecord>, usize), CacheError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let kind = buf[offset];
        if kind != KIND_SET && kind != KIND_DEL {
            return Err(CacheError::Corrupt(format!(
                "unknown record kind {kind} at offset {offset}"
            )));
        }
        if buf.len() - offset < HEADER_LEN {
            break;
        }

        let header = &buf[offset..offset + HEADER_LEN];
        let expires_at = le_u64(&header[1..9]);
        let key_len = le_u32(&header[9..13]) as usize;
        let val_len = le_u32(&header[13..17]) as usize;

        if kind == KIND_DEL && (val_len != 0 || expires_at != 0) {
            return Err(CacheError::Corrupt(format!(
                "delete record at offset {offset} carries a value or expiry"
            )));
        }

        let body_start = offset + HEADER_LEN;
        let body_end = body_start + key_len + val_len;
        if body_end > buf.len() {
            break;
        }

        let key = std::str::from_utf8(&buf[body_start..body_start + key_len])
            .map_err(|e| CacheError::Corrupt(format!("key at offset {offset} is not UTF-8: {e}")))?
            .to_string();

        let record = if kind == KIND_SET {
            LogRecord::Set {
                key,
                value: buf[body_start + key_len..body_end].to_vec(),
                expires_at,
            }
        } else {
            LogRecord::Del { key }
        };

        records.push(record);
        offset = body_end;
    }

    Ok((records, offset))
}

/// Append-only log of cache mutations
pub(crate) struct PersistenceLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    sync_writes: bool,
}

impl PersistenceLog {
    /// Open (or create) the log in `dir` and read back its records
    pub(crate) fn open(
        dir: &Path,
        sync_writes: bool,
    ) -> Result<(Self, Vec<LogRecord>), CacheError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE_NAME);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let (records, valid_len) = decode_records(&buf)?;

        if valid_len < buf.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = buf.len() - valid_len,
                "Dropping torn record at end of persistence log"
            );
            file.set_len(valid_len as u64)?;
        }

        let log = Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            sync_writes,
        };
        Ok((log, records))
    }

    /// Append one record, flushing it to the OS (and to disk with `sync_writes`)
    pub(crate) fn append(&self, record: &LogRecord) -> Result<(), CacheError> {
        let mut buf = Vec::new();
        record.encode(&mut buf)?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| CacheError::Poisoned("persistence log"))?;
        writer.write_all(&buf)?;
        writer.flush()?;
        if self.sync_writes {
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Discard every record
    pub(crate) fn truncate(&self) -> Result<(), CacheError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| CacheError::Poisoned("persistence log"))?;
        writer.flush()?;
        writer.get_ref().set_len(0)?;
        if self.sync_writes {
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(key: &str, value: &[u8]) -> LogRecord {
        LogRecord::Set {
            key: key.to_string(),
            value: value.to_vec(),
            expires_at: 0,
        }
    }

    #[test]
    fn test_decode_stops_at_torn_tail() {
        let mut buf = Vec::new();
        set("a", b"one").encode(&mut buf).unwrap();
        let complete = buf.len();
        set("b", b"two").encode(&mut buf).unwrap();
        buf.truncate(buf.len() - 2);

        let (records, valid_len) = decode_records(&buf).unwrap();

        assert_eq!(records, vec![set("a", b"one")]);
        assert_eq!(valid_len, complete);
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut buf = Vec::new();
        set("a", b"one").encode(&mut buf).unwrap();
        buf[0] = 9;

        let err = decode_records(&buf).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt(_)));
    }

    #[test]
    fn test_decode_rejects_garbage_header() {
        let mut buf = Vec::new();
        set("a", b"one").encode(&mut buf).unwrap();
        buf.extend_from_slice(&[0xff; 32]);

        let err = decode_records(&buf).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt(_)));
    }

    #[test]
    fn test_decode_rejects_delete_with_value() {
        let mut buf = Vec::new();
        LogRecord::Del { key: "a".into() }.encode(&mut buf).unwrap();
        buf[13] = 4;

        let err = decode_records(&buf).unwrap_err();
        assert!(matches!(err, CacheError::Corrupt(_)));
    }

    #[test]
    fn test_open_keeps_corrupt_log_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE_NAME);
        std::fs::write(&path, [7u8; 32]).unwrap();

        let result = PersistenceLog::open(dir.path(), false);

        assert!(matches!(result, Err(CacheError::Corrupt(_))));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
    }

    #[test]
    fn test_open_truncates_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        {
            let (log, records) = PersistenceLog::open(dir.path(), false).unwrap();
            assert!(records.is_empty());
            log.append(&set("k1", b"v1")).unwrap();
            log.append(&LogRecord::Del { key: "k1".into() }).unwrap();
        }

        let path = dir.path().join(LOG_FILE_NAME);
        let mut bytes = std::fs::read(&path).unwrap();
        let intact = bytes.len();
        bytes.extend_from_slice(&[KIND_SET, 0, 0]);
        std::fs::write(&path, &bytes).unwrap();

        let (log, records) = PersistenceLog::open(dir.path(), true).unwrap();
        assert_eq!(
            records,
            vec![set("k1", b"v1"), LogRecord::Del { key: "k1".into() }]
        );
        assert_eq!(std::fs::metadata(log.path()).unwrap().len(), intact as u64);
    }

    #[test]
    fn test_truncate_empties_log() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _) = PersistenceLog::open(dir.path(), false).unwrap();
        log.append(&set("k", b"v")).unwrap();

        log.truncate().unwrap();
        log.append(&set("k2", b"v2")).unwrap();
        drop(log);

        let (_, records) = PersistenceLog::open(dir.path(), false).unwrap();
        assert_eq!(records, vec![set("k2", b"v2")]);
    }
}
