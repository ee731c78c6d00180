//! Config Watcher: a long-lived background thread observing the config file
//! for changes, with a debounce window so editor save patterns (rapid
//! write/rename bursts) collapse into one reload.
//!
//! Watching is metadata polling (mtime + length) rather than an inotify
//! subscription: the cadence of this system is daily, one stat per poll is
//! free, and a polling loop has no watch-descriptor failure modes to
//! recover from. A deleted config file is logged once and the last-known-good
//! snapshot stays in effect until the file reappears.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::core::errors::{LogVaultError, Result};
use crate::core::store::ConfigStore;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Tuning knobs for the watcher loop.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Interval between metadata polls.
    pub poll_interval: Duration,
    /// Quiet period after the last observed change before reloading.
    pub debounce: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            debounce: Duration::from_millis(100),
        }
    }
}

/// Fingerprint of the config file's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    mtime: SystemTime,
    len: u64,
}

fn stamp(path: &Path) -> Option<FileStamp> {
    let meta = fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    Some(FileStamp {
        mtime,
        len: meta.len(),
    })
}

/// Handle to a running watcher thread.
pub struct WatcherHandle {
    shutdown_tx: Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WatcherHandle {
    /// Stop the watcher thread and wait for it to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the watcher thread.
///
/// `on_change` runs after every reload that published a new snapshot
/// (scheduler rebuild in production). A spawn failure is returned so the
/// caller can degrade to "no hot-reload" without aborting the process.
pub fn spawn_watcher<F>(
    store: Arc<ConfigStore>,
    logger: ActivityLoggerHandle,
    options: WatcherOptions,
    on_change: F,
) -> Result<WatcherHandle>
where
    F: Fn(&ConfigStore) + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let join = thread::Builder::new()
        .name("logvault-watcher".to_string())
        .spawn(move || watcher_main(&store, &logger, &options, &on_change, &shutdown_rx))
        .map_err(|e| LogVaultError::Runtime {
            details: format!("failed to spawn watcher thread: {e}"),
        })?;

    Ok(WatcherHandle {
        shutdown_tx,
        join: Some(join),
    })
}

fn watcher_main<F>(
    store: &Arc<ConfigStore>,
    logger: &ActivityLoggerHandle,
    options: &WatcherOptions,
    on_change: &F,
    shutdown_rx: &Receiver<()>,
) where
    F: Fn(&ConfigStore),
{
    let path = store.path().to_path_buf();
    let mut last_seen = stamp(&path);
    let mut pending_since: Option<Instant> = None;
    let mut missing_logged = false;

    loop {
        match shutdown_rx.recv_timeout(options.poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let current = stamp(&path);
        match current {
            None => {
                // Keep running on last-known-good; the file may reappear.
                if !missing_logged {
                    missing_logged = true;
                    eprintln!(
                        "[LOGVAULT-WATCH] config file {} missing; keeping current snapshot",
                        path.display()
                    );
                    logger.send(ActivityEvent::Error {
                        code: "LV-1002".to_string(),
                        message: format!(
                            "config file {} missing; keeping current snapshot",
                            path.display()
                        ),
                    });
                }
                pending_since = None;
                continue;
            }
            Some(now_stamp) => {
                if missing_logged {
                    missing_logged = false;
                    // Reappearance counts as a change.
                    pending_since = Some(Instant::now());
                }
                if last_seen != Some(now_stamp) {
                    last_seen = Some(now_stamp);
                    pending_since = Some(Instant::now());
                }
            }
        }

        // Reload only once the debounce window has been quiet.
        if let Some(since) = pending_since
            && since.elapsed() >= options.debounce
        {
            pending_since = None;
            match store.reload() {
                Ok(true) => {
                    eprintln!("[LOGVAULT-WATCH] config reloaded from {}", path.display());
                    logger.send(ActivityEvent::ConfigReloaded {
                        details: format!("reloaded from {}", path.display()),
                    });
                    on_change(store.as_ref());
                }
                Ok(false) => {
                    eprintln!("[LOGVAULT-WATCH] config rewrite produced no effective change");
                }
                Err(e) => {
                    // Previous snapshot stays in effect.
                    eprintln!("[LOGVAULT-WATCH] config reload failed: {e}");
                    logger.send(ActivityEvent::Error {
                        code: e.code().to_string(),
                        message: format!("config reload failed: {e}"),
                    });
                }
            }
        }
    }
}
