//! Producer loop: drain the reading buffer into the shared log every interval.

use std::sync::Arc;

use sensormesh_store::{EntryId, EventLogStore};

use crate::error::DaemonError;
use crate::lifecycle::{CancelReason, Lifecycle};
use crate::reading::{ReadingBuffer, ReadingSource};
use crate::schedule::Ticker;

pub struct Producer {
    store: Arc<dyn EventLogStore>,
    source: Box<dyn ReadingSource>,
    buffer: ReadingBuffer,
    appended: u64,
}

impl Producer {
    pub fn new(store: Arc<dyn EventLogStore>, source: Box<dyn ReadingSource>) -> Self {
        Self {
            store,
            source,
            buffer: ReadingBuffer::new(),
            appended: 0,
        }
    }

    pub fn buffer(&self) -> &ReadingBuffer {
        &self.buffer
    }

    /// Entries successfully appended so far.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// One iteration: sample, append, and reset the buffer whatever happened.
    pub async fn step(&mut self) -> Result<EntryId, DaemonError> {
        let result = self.sample_and_append().await;
        self.buffer.reset();
        if result.is_ok() {
            self.appended += 1;
        }
        result
    }

    async fn sample_and_append(&mut self) -> Result<EntryId, DaemonError> {
        self.source.sample(&mut self.buffer)?;

        let store = Arc::clone(&self.store);
        let payload = self.buffer.as_bytes().to_vec();
        tokio::task::spawn_blocking(move || store.append(&payload))
            .await
            .map_err(|err| DaemonError::Join {
                task: "append",
                reason: err.to_string(),
            })?
            .map_err(DaemonError::Append)
    }

    /// Run until cancelled. An append failure cancels the lifecycle and ends
    /// the loop with that error; there is no retry.
    pub async fn run(mut self, mut ticker: Ticker, lifecycle: Lifecycle) -> Result<u64, DaemonError> {
        tracing::info!(interval_ms = ticker.period().as_millis(), "producer started");
        while ticker.tick(&lifecycle).await {
            match self.step().await {
                Ok(id) => {
                    tracing::debug!(entry = %id, appended = self.appended, "appended reading");
                }
                Err(err) => {
                    tracing::error!(error = %err, "producer stopping");
                    lifecycle.cancel(CancelReason::ProducerFailed);
                    return Err(err);
                }
            }
        }
        tracing::info!(appended = self.appended, "producer stopped");
        Ok(self.appended)
    }
}
