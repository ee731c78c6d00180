//! Daemon lifecycle: explicit `start`/`stop` owned by the host process.
//!
//! The host decides how to block and which signals map to [`LogVault::stop`];
//! this object only assembles the components and tears them down in order.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::collector::Collector;
use crate::core::errors::{LogVaultError, Result};
use crate::core::store::ConfigStore;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
use crate::logger::jsonl::JsonlConfig;
use crate::schedule::Scheduler;
use crate::watcher::{WatcherHandle, WatcherOptions, spawn_watcher};

/// Options for assembling the daemon.
#[derive(Debug, Clone, Default)]
pub struct LogVaultOptions {
    /// Activity log configuration. `None` disables the logger thread.
    pub jsonl: Option<JsonlConfig>,
    /// Watcher tuning.
    pub watcher: WatcherOptions,
}

/// The assembled collection-and-retention engine.
///
/// Construction order: config store (initial load is fatal on failure),
/// target directory, logger thread, scheduler + initial rebuild, watcher.
/// Teardown runs in reverse; in-flight collection jobs complete on their own
/// threads.
pub struct LogVault {
    store: Arc<ConfigStore>,
    scheduler: Arc<Scheduler>,
    watcher: Option<WatcherHandle>,
    logger: ActivityLoggerHandle,
    logger_join: Option<thread::JoinHandle<()>>,
    started_at: Instant,
    stopped: bool,
}

impl LogVault {
    /// Initialize configuration, ensure the target directory exists, build
    /// the initial schedule, and start watching for config changes.
    ///
    /// Returns control to the host; collection happens on background threads.
    pub fn start(config_path: &Path, options: LogVaultOptions) -> Result<Self> {
        let store = Arc::new(ConfigStore::open(config_path)?);
        let snapshot = store.current();

        fs::create_dir_all(&snapshot.global.target_dir)
            .map_err(|source| LogVaultError::io(&snapshot.global.target_dir, source))?;

        let (logger, logger_join) = match options.jsonl {
            Some(jsonl) => {
                let (handle, join) = spawn_logger(jsonl)?;
                (handle, Some(join))
            }
            None => (ActivityLoggerHandle::disconnected(), None),
        };

        let collector = Arc::new(Collector::new(Arc::clone(&store), logger.clone()));
        let scheduler = Arc::new(Scheduler::new(collector, logger.clone()));
        scheduler.start()?;
        scheduler.rebuild(&snapshot)?;

        let watcher = {
            let scheduler_for_watcher = Arc::clone(&scheduler);
            let result = spawn_watcher(
                Arc::clone(&store),
                logger.clone(),
                options.watcher,
                move |store: &ConfigStore| {
                    if let Err(e) = scheduler_for_watcher.rebuild(&store.current()) {
                        eprintln!("[LOGVAULT-DAEMON] schedule rebuild failed: {e}");
                    }
                },
            );
            match result {
                Ok(handle) => Some(handle),
                Err(e) => {
                    // Degrade to no hot-reload; SIGHUP still works.
                    eprintln!("[LOGVAULT-DAEMON] config watcher unavailable: {e}");
                    logger.send(ActivityEvent::Error {
                        code: e.code().to_string(),
                        message: format!("config watcher unavailable: {e}"),
                    });
                    None
                }
            }
        };

        let config_hash = snapshot.stable_hash().unwrap_or_default();
        logger.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
        });
        eprintln!(
            "[LOGVAULT-DAEMON] started: {} app(s) scheduled, archiving into {}",
            scheduler.active_apps().len(),
            snapshot.global.target_dir.display()
        );

        Ok(Self {
            store,
            scheduler,
            watcher,
            logger,
            logger_join,
            started_at: Instant::now(),
            stopped: false,
        })
    }

    /// The shared config store.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// The scheduler, for introspection (`check`, tests).
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Manual reload path (SIGHUP): reload the store and rebuild the
    /// schedule if the snapshot changed. Failures keep the previous state.
    pub fn reload_now(&self) {
        match self.store.reload() {
            Ok(true) => {
                self.logger.send(ActivityEvent::ConfigReloaded {
                    details: "manual reload".to_string(),
                });
                if let Err(e) = self.scheduler.rebuild(&self.store.current()) {
                    eprintln!("[LOGVAULT-DAEMON] schedule rebuild failed: {e}");
                }
            }
            Ok(false) => {
                eprintln!("[LOGVAULT-DAEMON] config unchanged, skipping rebuild");
            }
            Err(e) => {
                eprintln!("[LOGVAULT-DAEMON] config reload failed: {e}");
                self.logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: format!("config reload failed: {e}"),
                });
            }
        }
    }

    /// Halt the watcher and scheduler. No fires occur after this returns;
    /// in-flight jobs run to completion on their own threads. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Some(watcher) = self.watcher.take() {
            watcher.shutdown();
        }
        self.scheduler.stop();

        let uptime_secs = self.started_at.elapsed().as_secs();
        self.logger.send(ActivityEvent::DaemonStopped {
            reason: "clean shutdown".to_string(),
            uptime_secs,
        });
        self.logger.shutdown();
        if let Some(join) = self.logger_join.take() {
            let _ = join.join();
        }
        eprintln!("[LOGVAULT-DAEMON] shutdown complete (uptime={uptime_secs}s)");
    }
}

impl Drop for LogVault {
    fn drop(&mut self) {
        self.stop();
    }
}
