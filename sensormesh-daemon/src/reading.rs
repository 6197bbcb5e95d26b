//! Sensor readings and the buffer the producer drains every interval.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use sensormesh_core::NodeName;

use crate::error::DaemonError;

/// One placeholder reading: `{"type":"whisper","name":"node-a","time":"…"}`.
///
/// The timestamp makes consecutive readings distinct, which is what lets the
/// consumer treat "differs from the last mirrored value" as "new".
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub time: String,
}

impl Reading {
    pub fn whisper(node: &NodeName, at: DateTime<Utc>) -> Self {
        Self {
            kind: "whisper",
            name: node.0.clone(),
            time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Pending bytes for the next append. Owned by the producer alone.
#[derive(Debug, Default)]
pub struct ReadingBuffer {
    bytes: Vec<u8>,
}

impl ReadingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one reading as a JSON line.
    pub fn record(&mut self, reading: &Reading) -> Result<(), DaemonError> {
        serde_json::to_writer(&mut self.bytes, reading)?;
        self.bytes.push(b'\n');
        Ok(())
    }

    pub fn extend(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
    }
}

/// Fills the reading buffer once per producer interval.
pub trait ReadingSource: Send {
    fn sample(&mut self, buffer: &mut ReadingBuffer) -> Result<(), DaemonError>;
}

/// Stands in for real sensor acquisition: one timestamped whisper per interval.
#[derive(Debug, Clone)]
pub struct PlaceholderSource {
    node: NodeName,
}

impl PlaceholderSource {
    pub fn new(node: NodeName) -> Self {
        Self { node }
    }
}

impl ReadingSource for PlaceholderSource {
    fn sample(&mut self, buffer: &mut ReadingBuffer) -> Result<(), DaemonError> {
        let reading = Reading::whisper(&self.node, Utc::now());
        tracing::debug!(name = %reading.name, time = %reading.time, "whisper");
        buffer.record(&reading)
    }
}
