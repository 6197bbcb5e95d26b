//! Daemon coordinator: setup, the producer / consumer / interrupt tasks, and
//! orderly teardown.
//!
//! Setup errors (config, intervals, store, sink) return before any task is
//! spawned. Once the loops run, whatever cancels the lifecycle, all three tasks
//! are joined, the sink is closed once, and the store address plus the
//! consumer cursor are written back to the configuration.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sensormesh_core::paths::{default_stores_root, DEFAULT_STORE_NAME};
use sensormesh_core::{config, Config, ConsumeMode, Intervals};
use sensormesh_store::{EntryId, EventLogStore};

use crate::consumer::Consumer;
use crate::error::{io_err, DaemonError};
use crate::lifecycle::{CancelReason, Lifecycle, LifecycleState};
use crate::producer::Producer;
use crate::reading::{PlaceholderSource, ReadingSource};
use crate::schedule::Ticker;
use crate::sink::LocalSink;

/// Set to `json` for JSON log lines.
pub const LOG_FORMAT_ENV: &str = "SENSORMESH_LOG_FORMAT";

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Store address or name; beats `store.address` from the config.
    pub store_address: Option<String>,
    pub produce_ms: Option<u64>,
    pub consume_ms: Option<u64>,
    pub consume_mode: Option<ConsumeMode>,
}

/// Cadence and dedup policy the two loops run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub produce_every: Duration,
    pub consume_every: Duration,
    pub mode: ConsumeMode,
}

impl LoopSettings {
    pub fn resolve(config: &Config, options: &DaemonOptions) -> Result<Self, DaemonError> {
        let intervals = Intervals {
            produce_ms: options.produce_ms.unwrap_or(config.intervals.produce_ms),
            consume_ms: options.consume_ms.unwrap_or(config.intervals.consume_ms),
        };
        intervals.validate()?;
        Ok(Self {
            produce_every: intervals.produce(),
            consume_every: intervals.consume(),
            mode: options.consume_mode.unwrap_or(config.consume_mode),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub reason: CancelReason,
    pub appended: u64,
    pub mirrored: u64,
    pub store_address: String,
}

/// How the loops ended, plus where the consumer got to. The cursor is
/// reported on failures too so the next run can resume.
#[derive(Debug)]
pub struct LoopsOutcome {
    pub cursor: Option<EntryId>,
    pub result: Result<ShutdownReport, DaemonError>,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, options: DaemonOptions) -> Result<ShutdownReport, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), options))
}

/// Run the daemon until Ctrl-C or a fatal loop error.
pub async fn run(home: PathBuf, options: DaemonOptions) -> Result<ShutdownReport, DaemonError> {
    run_until(home, options, tokio::signal::ctrl_c()).await
}

/// Run the daemon until `interrupt` resolves or a loop fails.
pub async fn run_until<F>(
    home: PathBuf,
    options: DaemonOptions,
    interrupt: F,
) -> Result<ShutdownReport, DaemonError>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let mut config = config::load_at(&home)?;
    let settings = LoopSettings::resolve(&config, &options)?;

    let stores_root = config
        .store
        .data_dir
        .clone()
        .unwrap_or_else(|| default_stores_root(&home));
    let target = options
        .store_address
        .clone()
        .or_else(|| config.store.address.clone())
        .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());

    let store = tokio::task::spawn_blocking(move || sensormesh_store::open(&stores_root, &target))
        .await
        .map_err(|err| DaemonError::Join {
            task: "store-open",
            reason: err.to_string(),
        })??;
    let sink = LocalSink::open(&config.logfile)?;

    let address = store.address().to_string();
    let resume = config.store.cursor_for(&address).map(EntryId::from);

    tracing::info!(
        node = %config.name,
        address = %address,
        sink = %sink.path().display(),
        produce_ms = settings.produce_every.as_millis(),
        consume_ms = settings.consume_every.as_millis(),
        resume_after = ?resume,
        "daemon starting",
    );

    let source = Box::new(PlaceholderSource::new(config.name.clone()));
    let outcome = run_loops(
        Arc::clone(&store),
        source,
        sink,
        resume.clone(),
        settings,
        Lifecycle::new(),
        interrupt,
    )
    .await;

    config.store.address = Some(address);
    config.store.cursor = outcome.cursor.or(resume).map(|id| id.0);
    let persisted = config::save_at(&home, &mut config);
    if let Err(err) = &persisted {
        tracing::error!(error = %err, "failed to persist store address");
    }

    let report = outcome.result?;
    persisted?;
    Ok(report)
}

/// Spawn producer, consumer and interrupt watcher on a shared lifecycle, wait
/// for all three, then close the sink. The consumer starts after `resume`.
pub async fn run_loops<F>(
    store: Arc<dyn EventLogStore>,
    source: Box<dyn ReadingSource>,
    sink: LocalSink,
    resume: Option<EntryId>,
    settings: LoopSettings,
    lifecycle: Lifecycle,
    interrupt: F,
) -> LoopsOutcome
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let store_address = store.address().to_string();

    let producer_handle = {
        let lifecycle = lifecycle.clone();
        let producer = Producer::new(Arc::clone(&store), source);
        let ticker = Ticker::delayed(settings.produce_every);
        tokio::spawn(async move {
            let _guard = CancelOnDrop::new(lifecycle.clone(), CancelReason::ProducerFailed);
            producer.run(ticker, lifecycle).await
        })
    };

    let consumer_handle = {
        let lifecycle = lifecycle.clone();
        let consumer = Consumer::new(Arc::clone(&store), sink, settings.mode).resume_after(resume);
        let ticker = Ticker::immediate(settings.consume_every);
        tokio::spawn(async move {
            let _guard = CancelOnDrop::new(lifecycle.clone(), CancelReason::ConsumerFailed);
            consumer.run(ticker, lifecycle).await
        })
    };

    let signal_handle = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = lifecycle.cancelled() => Ok(()),
                signal = interrupt => match signal {
                    Ok(()) => {
                        tracing::info!("received interrupt, shutting down daemon");
                        lifecycle.cancel(CancelReason::Interrupt);
                        Ok(())
                    }
                    Err(err) => {
                        lifecycle.cancel(CancelReason::SignalFailed);
                        Err(DaemonError::Signal(err.to_string()))
                    }
                }
            }
        })
    };

    let (producer_result, consumer_result, signal_result) =
        tokio::join!(producer_handle, consumer_handle, signal_handle);

    let appended = handle_join("producer", producer_result);
    let (mirrored, cursor) = match consumer_result {
        Ok((consumer, result)) => {
            let cursor = consumer.cursor().cloned();
            (close_after(consumer.into_sink(), result), cursor)
        }
        Err(err) => (Err(join_error("consumer", err)), None),
    };
    let signal = handle_join("signal_handler", signal_result);

    let result = summarize(&lifecycle, appended, mirrored, signal, store_address);
    LoopsOutcome { cursor, result }
}

fn summarize(
    lifecycle: &Lifecycle,
    appended: Result<u64, DaemonError>,
    mirrored: Result<u64, DaemonError>,
    signal: Result<(), DaemonError>,
    store_address: String,
) -> Result<ShutdownReport, DaemonError> {
    let LifecycleState::Cancelled(reason) = lifecycle.state() else {
        return Err(DaemonError::Join {
            task: "coordinator",
            reason: "loops exited while the daemon was still running".to_string(),
        });
    };

    let appended = appended?;
    let mirrored = mirrored?;
    signal?;

    tracing::info!(reason = %reason, appended, mirrored, "daemon stopped");
    Ok(ShutdownReport {
        reason,
        appended,
        mirrored,
        store_address,
    })
}

/// Cancels the lifecycle if a loop task unwinds before it returns.
struct CancelOnDrop {
    lifecycle: Lifecycle,
    reason: CancelReason,
}

impl CancelOnDrop {
    fn new(lifecycle: Lifecycle, reason: CancelReason) -> Self {
        Self { lifecycle, reason }
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.lifecycle.cancel(self.reason);
    }
}

fn close_after(sink: LocalSink, result: Result<u64, DaemonError>) -> Result<u64, DaemonError> {
    let closed = sink.close();
    match (result, closed) {
        (Ok(mirrored), Ok(())) => Ok(mirrored),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), closed) => {
            if let Err(close_err) = closed {
                tracing::warn!(error = %close_err, "closing local sink after failure");
            }
            Err(err)
        }
    }
}

fn handle_join<T>(
    task: &'static str,
    result: Result<Result<T, DaemonError>, tokio::task::JoinError>,
) -> Result<T, DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_error(task, err)),
    }
}

fn join_error(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        reason: err.to_string(),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use chrono::Utc;
    use sensormesh_core::NodeName;
    use sensormesh_store::{
        EntryId, ListOptions, LogEntry, MemoryLogStore, StoreAddress, StoreError,
    };
    use tempfile::TempDir;

    use crate::reading::ReadingBuffer;

    /// Distinct payload per interval: `reading-1\n`, `reading-2\n`, …
    struct Counter(u64);

    impl ReadingSource for Counter {
        fn sample(&mut self, buffer: &mut ReadingBuffer) -> Result<(), DaemonError> {
            self.0 += 1;
            buffer.extend(format!("reading-{}\n", self.0).as_bytes());
            Ok(())
        }
    }

    /// Memory store whose `fail_on`-th append (1-based) and every later one fail.
    struct FlakyStore {
        inner: MemoryLogStore,
        attempts: AtomicUsize,
        fail_on: usize,
        failed_at: std::sync::Mutex<Option<Instant>>,
    }

    impl FlakyStore {
        fn new(fail_on: usize) -> Self {
            Self {
                inner: MemoryLogStore::new("event").expect("store"),
                attempts: AtomicUsize::new(0),
                fail_on,
                failed_at: std::sync::Mutex::new(None),
            }
        }
    }

    impl EventLogStore for FlakyStore {
        fn address(&self) -> &StoreAddress {
            self.inner.address()
        }
        fn append(&self, payload: &[u8]) -> Result<EntryId, StoreError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.fail_on {
                *self.failed_at.lock().unwrap() = Some(Instant::now());
                return Err(StoreError::Unavailable(format!("append {attempt} rejected")));
            }
            self.inner.append(payload)
        }
        fn list(&self, options: &ListOptions) -> Result<Vec<LogEntry>, StoreError> {
            self.inner.list(options)
        }
    }

    fn settings(produce_ms: u64, consume_ms: u64) -> LoopSettings {
        LoopSettings {
            produce_every: Duration::from_millis(produce_ms),
            consume_every: Duration::from_millis(consume_ms),
            mode: ConsumeMode::Newest,
        }
    }

    fn sink_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .expect("read sink")
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn append_failure_on_third_iteration_tears_everything_down() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("sink.log");
        let store = Arc::new(FlakyStore::new(3));
        let lifecycle = Lifecycle::new();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_loops(
                store.clone(),
                Box::new(Counter(0)),
                LocalSink::open(&path).expect("sink"),
                None,
                settings(60, 10),
                lifecycle.clone(),
                std::future::pending(),
            ),
        )
        .await
        .expect("daemon must stop by itself");
        let stopped_at = Instant::now();

        let err = outcome.result.unwrap_err();
        assert!(matches!(err, DaemonError::Append(_)), "got: {err}");
        assert_eq!(
            lifecycle.state(),
            LifecycleState::Cancelled(CancelReason::ProducerFailed)
        );

        let failed_at = store.failed_at.lock().unwrap().expect("third append attempted");
        assert!(
            stopped_at.duration_since(failed_at) < Duration::from_millis(500),
            "consumer should stop within a poll interval of the failure"
        );

        assert_eq!(sink_lines(&path), ["reading-1", "reading-2"]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3, "no retry, no further appends");
        assert_eq!(store.inner.len(), 2);

        let newest = store.inner.list(&ListOptions::default()).expect("list");
        assert_eq!(outcome.cursor.as_ref(), newest.first().map(|e| &e.id));
    }

    #[tokio::test]
    async fn interrupt_is_a_clean_shutdown() {
        let dir = TempDir::new().expect("dir");
        let path = dir.path().join("sink.log");
        let store = Arc::new(MemoryLogStore::new("event").expect("store"));
        let lifecycle = Lifecycle::new();

        let report = run_loops(
            store.clone(),
            Box::new(PlaceholderSource::new(NodeName::from("node-a"))),
            LocalSink::open(&path).expect("sink"),
            None,
            settings(20, 5),
            lifecycle.clone(),
            async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                Ok(())
            },
        )
        .await
        .result
        .expect("clean shutdown");

        assert_eq!(report.reason, CancelReason::Interrupt);
        assert_eq!(report.store_address, store.address().to_string());
        assert!(report.appended >= 1);
        assert_eq!(report.appended, store.len() as u64);

        let lines = sink_lines(&path);
        assert_eq!(lines.len() as u64, report.mirrored);
        assert!(lines.iter().all(|l| l.contains(r#""type":"whisper""#)));
        assert!(lines.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[tokio::test]
    async fn signal_handler_failure_cancels_with_error() {
        let dir = TempDir::new().expect("dir");
        let lifecycle = Lifecycle::new();

        let err = run_loops(
            Arc::new(MemoryLogStore::new("event").expect("store")),
            Box::new(Counter(0)),
            LocalSink::open(&dir.path().join("sink.log")).expect("sink"),
            None,
            settings(1_000, 10),
            lifecycle.clone(),
            async { Err(std::io::Error::other("no signal support")) },
        )
        .await
        .result
        .unwrap_err();

        assert!(matches!(err, DaemonError::Signal(_)), "got: {err}");
        assert_eq!(
            lifecycle.state(),
            LifecycleState::Cancelled(CancelReason::SignalFailed)
        );
    }

    #[tokio::test]
    async fn consumer_failure_stops_the_producer() {
        struct ListFails(MemoryLogStore);

        impl EventLogStore for ListFails {
            fn address(&self) -> &StoreAddress {
                self.0.address()
            }
            fn append(&self, payload: &[u8]) -> Result<EntryId, StoreError> {
                self.0.append(payload)
            }
            fn list(&self, _options: &ListOptions) -> Result<Vec<LogEntry>, StoreError> {
                Err(StoreError::Unavailable(format!("down since {}", Utc::now())))
            }
        }

        let dir = TempDir::new().expect("dir");
        let store = Arc::new(ListFails(MemoryLogStore::new("event").expect("store")));
        let lifecycle = Lifecycle::new();

        let err = run_loops(
            store.clone(),
            Box::new(Counter(0)),
            LocalSink::open(&dir.path().join("sink.log")).expect("sink"),
            None,
            settings(1_000, 10),
            lifecycle.clone(),
            std::future::pending(),
        )
        .await
        .result
        .unwrap_err();

        assert!(matches!(err, DaemonError::Fetch(_)), "got: {err}");
        assert_eq!(
            lifecycle.state(),
            LifecycleState::Cancelled(CancelReason::ConsumerFailed)
        );
        assert!(store.0.is_empty(), "producer never reached its first interval");
    }

    #[test]
    fn options_override_config_cadence_and_mode() {
        let now = Utc::now();
        let config = Config {
            name: NodeName::from("node-a"),
            logfile: PathBuf::from("/tmp/sink.log"),
            store: Default::default(),
            intervals: Intervals::default(),
            consume_mode: ConsumeMode::Newest,
            created_at: now,
            updated_at: now,
        };

        let defaults = LoopSettings::resolve(&config, &DaemonOptions::default()).expect("defaults");
        assert_eq!(defaults.produce_every, Duration::from_secs(30));
        assert_eq!(defaults.consume_every, Duration::from_millis(500));

        let overridden = LoopSettings::resolve(
            &config,
            &DaemonOptions {
                produce_ms: Some(2_000),
                consume_ms: Some(100),
                consume_mode: Some(ConsumeMode::CatchUp),
                ..Default::default()
            },
        )
        .expect("overrides");
        assert_eq!(overridden.produce_every, Duration::from_secs(2));
        assert_eq!(overridden.mode, ConsumeMode::CatchUp);

        let inverted = LoopSettings::resolve(
            &config,
            &DaemonOptions {
                consume_ms: Some(60_000),
                ..Default::default()
            },
        );
        assert!(matches!(inverted, Err(DaemonError::Config(_))));
    }
}
