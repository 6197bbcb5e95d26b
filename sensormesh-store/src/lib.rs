//! The shared append-only log a sensormesh node writes to and tails.
//!
//! Replication between peers is the backend's business; this crate only
//! defines the handle the daemon talks to ([`EventLogStore`]) and ships two
//! backends: [`MemoryLogStore`] and the JSONL-backed [`FileLogStore`].

pub mod address;
pub mod entry;
pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use address::StoreAddress;
pub use entry::{EntryId, LogEntry};
pub use error::StoreError;
pub use file::FileLogStore;
pub use memory::MemoryLogStore;
pub use store::{open, EventLogStore, ListOptions};
