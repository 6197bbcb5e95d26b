//! JSONL-backed log store.
//!
//! One record per line at `<root>/<id>/<name>.jsonl`:
//!
//! ```text
//! {"id":"9f0c…","payload":"7b2274797065…","appended_at":"2026-10-19T12:00:00Z"}
//! ```
//!
//! Payload bytes are hex-encoded. Every append is a single `write_all` of a
//! whole line to an `O_APPEND` handle, so several node processes sharing the
//! directory interleave complete records. Readers reopen the file on every
//! `list`, which makes other writers' appends visible.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::StoreAddress;
use crate::entry::{EntryId, LogEntry};
use crate::error::{io_err, StoreError};
use crate::store::{EventLogStore, ListOptions};

/// On-disk record.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    id: EntryId,
    payload: String,
    appended_at: DateTime<Utc>,
}

pub struct FileLogStore {
    address: StoreAddress,
    path: PathBuf,
    file: Mutex<File>,
    seq: AtomicU64,
}

impl FileLogStore {
    /// Open or create the log file for `address` under `root`.
    pub fn open(root: &Path, address: StoreAddress) -> Result<Self, StoreError> {
        let path = address.file_path(root);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        Ok(Self {
            address,
            path,
            file: Mutex::new(file),
            seq: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<LogEntry>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_err(&self.path, err)),
        };

        let mut entries = Vec::new();
        let mut lines = bytes.split(|b| *b == b'\n').enumerate().peekable();
        while let Some((index, line)) = lines.next() {
            // The final segment is either empty or a record still being written.
            if lines.peek().is_none() {
                if !line.is_empty() {
                    tracing::debug!(path = %self.path.display(), "skipping partial trailing record");
                }
                break;
            }
            if line.is_empty() {
                continue;
            }
            entries.push(self.decode(index + 1, line)?);
        }
        Ok(entries)
    }

    fn decode(&self, line_no: usize, line: &[u8]) -> Result<LogEntry, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            path: self.path.clone(),
            line: line_no,
            reason,
        };
        let record: Record = serde_json::from_slice(line).map_err(|e| corrupt(e.to_string()))?;
        let payload = hex::decode(&record.payload).map_err(|e| corrupt(e.to_string()))?;
        Ok(LogEntry {
            id: record.id,
            payload,
            appended_at: record.appended_at,
        })
    }
}

impl EventLogStore for FileLogStore {
    fn address(&self) -> &StoreAddress {
        &self.address
    }

    fn append(&self, payload: &[u8]) -> Result<EntryId, StoreError> {
        let appended_at = Utc::now();
        let seq = (u64::from(std::process::id()) << 32) | self.seq.fetch_add(1, Ordering::Relaxed);
        let id = EntryId::derive(&self.address.to_string(), payload, appended_at, seq);

        let mut line = serde_json::to_vec(&Record {
            id: id.clone(),
            payload: hex::encode(payload),
            appended_at,
        })?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| StoreError::Unavailable("file store lock poisoned".to_string()))?;
        file.write_all(&line).map_err(|e| io_err(&self.path, e))?;
        file.sync_data().map_err(|e| io_err(&self.path, e))?;
        Ok(id)
    }

    fn list(&self, options: &ListOptions) -> Result<Vec<LogEntry>, StoreError> {
        let entries = self.read_all()?;
        Ok(options.select(entries.iter().rev()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_event(root: &Path) -> FileLogStore {
        FileLogStore::open(root, StoreAddress::for_name("event").expect("address")).expect("open")
    }

    #[test]
    fn append_then_list_round_trips_binary_payloads() {
        let root = TempDir::new().expect("root");
        let store = open_event(root.path());

        store.append(b"first\n").expect("append");
        store.append(&[0, 159, 146, 150]).expect("append binary");

        let listed = store.list(&ListOptions::default()).expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].payload(), &[0, 159, 146, 150]);
        assert_eq!(listed[1].payload(), b"first\n");
    }

    #[test]
    fn partial_trailing_record_is_ignored() {
        let root = TempDir::new().expect("root");
        let store = open_event(root.path());
        store.append(b"complete").expect("append");

        let mut raw = OpenOptions::new().append(true).open(store.path()).expect("raw");
        raw.write_all(br#"{"id":"dead","payl"#).expect("partial write");

        let listed = store.list(&ListOptions::default()).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].payload(), b"complete");
    }

    #[test]
    fn corrupt_complete_line_reports_line_number() {
        let root = TempDir::new().expect("root");
        let store = open_event(root.path());
        store.append(b"ok").expect("append");

        let mut raw = OpenOptions::new().append(true).open(store.path()).expect("raw");
        raw.write_all(b"not json\n").expect("corrupt write");

        let err = store.list(&ListOptions::default()).unwrap_err();
        match err {
            StoreError::Corrupt { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn list_after_cursor_returns_only_newer_entries() {
        let root = TempDir::new().expect("root");
        let store = open_event(root.path());
        store.append(b"A").expect("A");
        let cursor = store.append(b"B").expect("B");
        store.append(b"C").expect("C");

        let newer = store.list(&ListOptions::after(cursor)).expect("list");
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].payload(), b"C");
    }
}
