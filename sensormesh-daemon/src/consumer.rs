//! Consumer loop: tail the shared log into the local sink.
//!
//! Dedup is adjacent-pair byte equality against the last mirrored value, so a
//! value that comes back after a different one is written again. On start the
//! last mirrored value is the sink's final line, which keeps a restart from
//! repeating it.

use std::sync::Arc;

use sensormesh_core::ConsumeMode;
use sensormesh_store::{EntryId, EventLogStore, ListOptions, LogEntry, StoreAddress};

use crate::error::DaemonError;
use crate::lifecycle::{CancelReason, Lifecycle};
use crate::schedule::Ticker;
use crate::sink::{trim_line_endings, LocalSink};

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing in the log (or nothing past the cursor).
    Empty,
    /// New data matched the last mirrored value.
    Unchanged,
    /// This many lines were written to the sink.
    Mirrored(usize),
}

pub struct Consumer {
    store: Arc<dyn EventLogStore>,
    sink: LocalSink,
    mode: ConsumeMode,
    last_seen: Option<Vec<u8>>,
    cursor: Option<EntryId>,
}

impl Consumer {
    pub fn new(store: Arc<dyn EventLogStore>, sink: LocalSink, mode: ConsumeMode) -> Self {
        let last_seen = sink.last_line().map(<[u8]>::to_vec);
        Self {
            store,
            sink,
            mode,
            last_seen,
            cursor: None,
        }
    }

    /// Continue after `cursor`, the newest entry a previous run handled.
    pub fn resume_after(mut self, cursor: Option<EntryId>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Bytes of the most recently mirrored entry.
    pub fn last_seen(&self) -> Option<&[u8]> {
        self.last_seen.as_deref()
    }

    /// Newest entry handled so far, mirrored or collapsed.
    pub fn cursor(&self) -> Option<&EntryId> {
        self.cursor.as_ref()
    }

    pub fn store_address(&self) -> &StoreAddress {
        self.store.address()
    }

    pub fn into_sink(self) -> LocalSink {
        self.sink
    }

    pub async fn poll(&mut self) -> Result<PollOutcome, DaemonError> {
        let entries = self.fetch().await?;
        self.apply(&entries)
    }

    async fn fetch(&self) -> Result<Vec<LogEntry>, DaemonError> {
        let options = match self.mode {
            ConsumeMode::Newest => ListOptions::default(),
            ConsumeMode::CatchUp => self
                .cursor
                .clone()
                .map_or_else(ListOptions::default, ListOptions::after),
        };

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.list(&options))
            .await
            .map_err(|err| DaemonError::Join {
                task: "list",
                reason: err.to_string(),
            })?
            .map_err(DaemonError::Fetch)
    }

    fn apply(&mut self, newest_first: &[LogEntry]) -> Result<PollOutcome, DaemonError> {
        match self.mode {
            ConsumeMode::Newest => self.mirror_newest(newest_first),
            ConsumeMode::CatchUp => self.mirror_since_cursor(newest_first),
        }
    }

    fn mirror_newest(&mut self, newest_first: &[LogEntry]) -> Result<PollOutcome, DaemonError> {
        let Some(newest) = newest_first.first() else {
            return Ok(PollOutcome::Empty);
        };
        let written = self.mirror(newest.payload())?;
        self.cursor = Some(newest.id.clone());
        if written {
            Ok(PollOutcome::Mirrored(1))
        } else {
            Ok(PollOutcome::Unchanged)
        }
    }

    fn mirror_since_cursor(&mut self, newest_first: &[LogEntry]) -> Result<PollOutcome, DaemonError> {
        let Some(newest) = newest_first.first() else {
            return Ok(PollOutcome::Empty);
        };

        let mut written = 0;
        for entry in newest_first.iter().rev() {
            if self.mirror(entry.payload())? {
                written += 1;
            }
            self.cursor = Some(entry.id.clone());
        }
        debug_assert_eq!(self.cursor.as_ref(), Some(&newest.id));

        if written == 0 {
            Ok(PollOutcome::Unchanged)
        } else {
            Ok(PollOutcome::Mirrored(written))
        }
    }

    /// Write `payload` unless it equals the last mirrored value. A value
    /// recovered from the sink has no line terminators, so the stripped
    /// payload is compared too.
    fn mirror(&mut self, payload: &[u8]) -> Result<bool, DaemonError> {
        if let Some(seen) = self.last_seen.as_deref() {
            if seen == payload || seen == trim_line_endings(payload) {
                return Ok(false);
            }
        }
        self.sink.write_entry(payload)?;
        self.last_seen = Some(payload.to_vec());
        Ok(true)
    }

    /// Run until cancelled, then hand the consumer back so the coordinator
    /// can close the sink and keep the cursor. A fetch or sink failure cancels
    /// the lifecycle and is returned. A list that completes after cancellation
    /// is dropped unwritten.
    pub async fn run(
        mut self,
        mut ticker: Ticker,
        lifecycle: Lifecycle,
    ) -> (Self, Result<u64, DaemonError>) {
        tracing::info!(
            interval_ms = ticker.period().as_millis(),
            mode = %self.mode,
            sink = %self.sink.path().display(),
            resumed = self.last_seen.is_some(),
            "consumer started",
        );
        while ticker.tick(&lifecycle).await {
            let fetched = self.fetch().await;
            if lifecycle.is_cancelled() {
                break;
            }
            match fetched.and_then(|entries| self.apply(&entries)) {
                Ok(PollOutcome::Mirrored(lines)) => {
                    tracing::debug!(lines, total = self.sink.lines_written(), "mirrored new entries");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(error = %err, "consumer stopping");
                    lifecycle.cancel(CancelReason::ConsumerFailed);
                    return (self, Err(err));
                }
            }
        }
        let mirrored = self.sink.lines_written();
        tracing::info!(mirrored, "consumer stopped");
        (self, Ok(mirrored))
    }
}
