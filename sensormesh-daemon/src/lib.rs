//! sensormesh daemon runtime: producer loop + consumer loop + lifecycle.

mod error;
pub mod consumer;
pub mod lifecycle;
pub mod producer;
pub mod reading;
mod runtime;
pub mod schedule;
pub mod sink;

pub use error::DaemonError;
pub use lifecycle::{CancelReason, Lifecycle, LifecycleState};
pub use runtime::{
    run, run_loops, run_until, start_blocking, DaemonOptions, LoopSettings, LoopsOutcome,
    ShutdownReport, LOG_FORMAT_ENV,
};
