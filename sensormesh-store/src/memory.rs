//! In-process log store.

use std::sync::Mutex;

use chrono::Utc;

use crate::address::StoreAddress;
use crate::entry::{EntryId, LogEntry};
use crate::error::StoreError;
use crate::store::{EventLogStore, ListOptions};

/// A log that lives in memory, oldest entry first.
#[derive(Debug)]
pub struct MemoryLogStore {
    address: StoreAddress,
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new(name: &str) -> Result<Self, StoreError> {
        Ok(Self {
            address: StoreAddress::for_name(name)?,
            entries: Mutex::new(Vec::new()),
        })
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<LogEntry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl EventLogStore for MemoryLogStore {
    fn address(&self) -> &StoreAddress {
        &self.address
    }

    fn append(&self, payload: &[u8]) -> Result<EntryId, StoreError> {
        let mut entries = self.lock()?;
        let appended_at = Utc::now();
        let id = EntryId::derive(
            &self.address.to_string(),
            payload,
            appended_at,
            entries.len() as u64,
        );
        entries.push(LogEntry {
            id: id.clone(),
            payload: payload.to_vec(),
            appended_at,
        });
        Ok(id)
    }

    fn list(&self, options: &ListOptions) -> Result<Vec<LogEntry>, StoreError> {
        let entries = self.lock()?;
        Ok(options.select(entries.iter().rev()))
    }
}
