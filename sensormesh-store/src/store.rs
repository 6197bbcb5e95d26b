//! The log handle shared by the producer and consumer loops.

use std::path::Path;
use std::sync::Arc;

use crate::address::StoreAddress;
use crate::entry::{EntryId, LogEntry};
use crate::error::StoreError;
use crate::file::FileLogStore;

/// Query for [`EventLogStore::list`]. The default lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Return at most this many entries.
    pub limit: Option<usize>,
    /// Stop before this entry; only strictly newer entries are returned.
    pub after: Option<EntryId>,
}

impl ListOptions {
    pub fn after(id: EntryId) -> Self {
        Self {
            limit: None,
            after: Some(id),
        }
    }

    /// Apply the options to an iterator that yields entries newest-first.
    pub(crate) fn select<'a, I>(&self, newest_first: I) -> Vec<LogEntry>
    where
        I: Iterator<Item = &'a LogEntry>,
    {
        newest_first
            .take_while(|entry| Some(&entry.id) != self.after.as_ref())
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// An append-only log replicated between peers.
///
/// Calls block; async callers run them on a blocking pool. Implementations
/// serialize concurrent appends and reads internally.
pub trait EventLogStore: Send + Sync {
    /// Resolved address, persisted so later runs reopen the same log.
    fn address(&self) -> &StoreAddress;

    /// Append one immutable entry.
    fn append(&self, payload: &[u8]) -> Result<EntryId, StoreError>;

    /// Materialized view of the log, newest entry first.
    fn list(&self, options: &ListOptions) -> Result<Vec<LogEntry>, StoreError>;
}

/// Resolve `input` (an address or a bare store name) to a file-backed store
/// rooted at `root`.
///
/// A bare name creates the store when missing. An address must already exist.
pub fn open(root: &Path, input: &str) -> Result<Arc<dyn EventLogStore>, StoreError> {
    let store = if StoreAddress::is_address(input) {
        let address: StoreAddress = input.parse()?;
        if !address.file_path(root).exists() {
            return Err(StoreError::NotFound {
                address: address.to_string(),
            });
        }
        FileLogStore::open(root, address)?
    } else {
        FileLogStore::open(root, StoreAddress::for_name(input)?)?
    };
    tracing::info!(address = %store.address(), path = %store.path().display(), "opened log store");
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(id: &str) -> LogEntry {
        LogEntry {
            id: EntryId::from(id),
            payload: id.as_bytes().to_vec(),
            appended_at: Utc::now(),
        }
    }

    #[test]
    fn select_honours_cursor_and_limit() {
        let newest_first = vec![entry("d"), entry("c"), entry("b"), entry("a")];

        let all = ListOptions::default().select(newest_first.iter());
        assert_eq!(all.len(), 4);

        let since_b = ListOptions::after(EntryId::from("b")).select(newest_first.iter());
        let ids: Vec<_> = since_b.iter().map(|e| e.id.0.as_str()).collect();
        assert_eq!(ids, ["d", "c"]);

        let top = ListOptions {
            limit: Some(1),
            after: None,
        }
        .select(newest_first.iter());
        assert_eq!(top[0].id, EntryId::from("d"));

        let unknown = ListOptions::after(EntryId::from("zz")).select(newest_first.iter());
        assert_eq!(unknown.len(), 4, "unknown cursor lists everything");
    }

    #[test]
    fn open_by_name_creates_then_address_reopens() {
        let root = TempDir::new().expect("root");
        let created = open(root.path(), "event").expect("create by name");
        created.append(b"A\n").expect("append");
        let address = created.address().to_string();

        let reopened = open(root.path(), &address).expect("reopen by address");
        assert_eq!(reopened.address().to_string(), address);
        assert_eq!(reopened.list(&ListOptions::default()).expect("list").len(), 1);
    }

    #[test]
    fn open_unknown_address_is_not_found() {
        let root = TempDir::new().expect("root");
        let address = StoreAddress::for_name("ghost").expect("address").to_string();
        let err = open(root.path(), &address).err().expect("must fail");
        assert!(matches!(err, StoreError::NotFound { .. }), "got: {err}");
    }
}
