//! Activity logging coordinator: a dedicated logger thread owns the
//! [`JsonlWriter`]; all other threads send [`ActivityEvent`] via a bounded
//! crossbeam channel. Non-blocking `try_send()` ensures scheduler dispatch
//! and collection jobs are never blocked by logging back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{LogVaultError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events that can be logged through the activity coordinator.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        config_hash: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
    },
    CollectionStarted {
        app: String,
    },
    CollectionCompleted {
        app: String,
        snapshot_dir: String,
        files: u64,
        bytes: u64,
        duration_ms: u64,
    },
    CollectionSkipped {
        app: String,
        reason: String,
        size_gb: f64,
    },
    RetentionCleaned {
        dirs_deleted: u64,
        size_gb_after: f64,
        details: String,
    },
    ScheduleRebuilt {
        apps_scheduled: usize,
        apps_skipped: usize,
    },
    ScheduleSkipped {
        app: String,
        reason: String,
    },
    ConfigReloaded {
        details: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
///
/// Internally wraps a bounded crossbeam `Sender`. The `send()` method uses
/// `try_send()` so callers are never blocked by logging back-pressure.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle wired to nowhere, for contexts that do not need a logger
    /// thread (`check` subcommand, unit tests).
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _rx) = bounded::<ActivityEvent>(1);
        Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The returned handle is `Clone + Send` and can be shared across threads.
/// The logger thread runs until `handle.shutdown()` is called or all senders
/// are dropped.
pub fn spawn_logger(
    config: JsonlConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("logvault-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, config, &dropped_clone);
        })
        .map_err(|e| LogVaultError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(
    rx: &Receiver<ActivityEvent>,
    jsonl_config: JsonlConfig,
    dropped: &Arc<AtomicU64>,
) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        // Report dropped events periodically.
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStop, Severity::Info);
            e.details = Some(format!("{reason} (uptime={uptime_secs}s)"));
            e
        }
        ActivityEvent::CollectionStarted { app } => {
            let mut e = LogEntry::new(EventType::CollectionStart, Severity::Info);
            e.app = Some(app.clone());
            e
        }
        ActivityEvent::CollectionCompleted {
            app,
            snapshot_dir,
            files,
            bytes,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::CollectionComplete, Severity::Info);
            e.app = Some(app.clone());
            e.path = Some(snapshot_dir.clone());
            e.items = Some(*files);
            e.bytes = Some(*bytes);
            e.duration_ms = Some(*duration_ms);
            e
        }
        ActivityEvent::CollectionSkipped {
            app,
            reason,
            size_gb,
        } => {
            let mut e = LogEntry::new(EventType::CollectionSkipped, Severity::Warning);
            e.app = Some(app.clone());
            e.size_gb = Some(*size_gb);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::RetentionCleaned {
            dirs_deleted,
            size_gb_after,
            details,
        } => {
            let mut e = LogEntry::new(EventType::RetentionClean, Severity::Info);
            e.items = Some(*dirs_deleted);
            e.size_gb = Some(*size_gb_after);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::ScheduleRebuilt {
            apps_scheduled,
            apps_skipped,
        } => {
            let mut e = LogEntry::new(EventType::ScheduleRebuilt, Severity::Info);
            e.details = Some(format!(
                "scheduled={apps_scheduled} skipped={apps_skipped}"
            ));
            e
        }
        ActivityEvent::ScheduleSkipped { app, reason } => {
            let mut e = LogEntry::new(EventType::ScheduleSkipped, Severity::Warning);
            e.app = Some(app.clone());
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::ConfigReloaded { details } => {
            let mut e = LogEntry::new(EventType::ConfigReload, Severity::Info);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DaemonStop, Severity::Info),
    }
}
