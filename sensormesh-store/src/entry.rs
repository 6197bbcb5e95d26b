//! Log entries and their identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier the log assigns to an appended entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    /// Derive a fresh id from the store address, the payload and a
    /// writer-local discriminator (clock nanos + counter).
    pub(crate) fn derive(address: &str, payload: &[u8], at: DateTime<Utc>, seq: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(payload);
        hasher.update(at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        hasher.update(seq.to_be_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..32].to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An immutable entry of the shared log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: EntryId,
    pub payload: Vec<u8>,
    pub appended_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_short_hex_and_distinct_per_sequence() {
        let at = Utc::now();
        let a = EntryId::derive("/sensormesh/x/event", b"A", at, 0);
        let b = EntryId::derive("/sensormesh/x/event", b"A", at, 1);
        assert_eq!(a.0.len(), 32);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b, "same payload appended twice must get two ids");
    }
}
