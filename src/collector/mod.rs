//! Collection Job: retention gate, snapshot directory creation, ordered
//! fail-fast copy, optional source truncation.
//!
//! Target-dir discipline: the retention gate runs under the **write** half
//! of a shared lock and copies run under the **read** half, so destructive
//! retention passes never overlap an in-flight copy while two apps' copies
//! may still proceed concurrently.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use parking_lot::RwLock;

use crate::core::config::{AppSpec, GlobalPolicy};
use crate::core::errors::Result;
use crate::core::store::ConfigStore;
use crate::fsops;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::retention::{self, QuotaVerdict, RetentionPolicy};
use crate::schedule::JobRunner;

/// Snapshot directory name format: `2026-08-06_02-30-00`.
const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// How one collection run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// Logs were copied into a fresh snapshot directory.
    Archived { files: u64, bytes: u64 },
    /// Over quota with `clean_auto` disabled; nothing copied, nothing deleted.
    ManualCleanupRequired,
    /// Still over quota after both retention passes; nothing copied.
    StillOverQuota,
    /// A file copy failed; remaining copies for this app were aborted.
    CopyFailed { file: String, error: String },
}

/// Report of one collection run for one application.
#[derive(Debug)]
pub struct CollectionReport {
    pub app: String,
    pub outcome: CollectionOutcome,
    /// Snapshot directory the run wrote into, when a copy was attempted.
    pub snapshot_dir: Option<PathBuf>,
}

/// The production job runner: archives one app's logs per trigger fire.
pub struct Collector {
    store: Arc<ConfigStore>,
    logger: ActivityLoggerHandle,
    /// Write side: retention deletion. Read side: in-flight copies.
    target_guard: RwLock<()>,
}

impl Collector {
    pub fn new(store: Arc<ConfigStore>, logger: ActivityLoggerHandle) -> Self {
        Self {
            store,
            logger,
            target_guard: RwLock::new(()),
        }
    }

    /// Run one collection for `app` under `global`.
    ///
    /// The retention gate always completes (success or decisive failure)
    /// before any copy begins. A quota verdict that forbids collection skips
    /// the copy for this fire; the next scheduled fire re-evaluates.
    pub fn collect(&self, app: &AppSpec, global: &GlobalPolicy) -> Result<CollectionReport> {
        let started = Instant::now();
        let policy = RetentionPolicy::from_global(global);

        let report = {
            let _exclusive = self.target_guard.write();
            retention::enforce(&global.target_dir, &policy)?
        };

        for (path, error) in &report.errors {
            self.logger.send(ActivityEvent::Error {
                code: "LV-3002".to_string(),
                message: format!("retention delete failed for {}: {error}", path.display()),
            });
        }
        if report.cleaned {
            self.logger.send(ActivityEvent::RetentionCleaned {
                dirs_deleted: report.dirs_deleted,
                size_gb_after: report.final_size_gb(),
                details: format!("quota {} GB", global.max_size),
            });
        }

        match report.verdict {
            QuotaVerdict::Under | QuotaVerdict::CleanedUnder => {}
            QuotaVerdict::ManualCleanupRequired => {
                let reason = format!(
                    "archive at {:.2} GB exceeds quota of {} GB and clean_auto is disabled; manual cleanup required",
                    report.final_size_gb(),
                    global.max_size
                );
                eprintln!("[LOGVAULT-COLLECT] {}: {reason}", app.name);
                self.logger.send(ActivityEvent::CollectionSkipped {
                    app: app.name.clone(),
                    reason,
                    size_gb: report.final_size_gb(),
                });
                return Ok(CollectionReport {
                    app: app.name.clone(),
                    outcome: CollectionOutcome::ManualCleanupRequired,
                    snapshot_dir: None,
                });
            }
            QuotaVerdict::StillOverQuota => {
                let reason = format!(
                    "archive still at {:.2} GB after both retention passes (quota {} GB); collection skipped for this fire",
                    report.final_size_gb(),
                    global.max_size
                );
                eprintln!("[LOGVAULT-COLLECT] {}: {reason}", app.name);
                self.logger.send(ActivityEvent::CollectionSkipped {
                    app: app.name.clone(),
                    reason,
                    size_gb: report.final_size_gb(),
                });
                return Ok(CollectionReport {
                    app: app.name.clone(),
                    outcome: CollectionOutcome::StillOverQuota,
                    snapshot_dir: None,
                });
            }
        }

        let snapshot_dir = global
            .target_dir
            .join(Local::now().format(SNAPSHOT_TIMESTAMP_FORMAT).to_string())
            .join(&app.name);
        // Idempotent: a pre-existing snapshot directory is not an error.
        std::fs::create_dir_all(&snapshot_dir)
            .map_err(|source| crate::core::errors::LogVaultError::io(&snapshot_dir, source))?;

        let mut files: u64 = 0;
        let mut bytes: u64 = 0;
        {
            let _shared = self.target_guard.read();
            for name in &app.log_files {
                let src = app.log_dir.join(name);
                let dst = snapshot_dir.join(name);
                match fsops::copy_recursive(&src, &dst) {
                    Ok(copied) => {
                        files += 1;
                        bytes += copied;
                    }
                    Err(e) => {
                        // Fail-fast: remaining copies for this app are aborted.
                        eprintln!(
                            "[LOGVAULT-COLLECT] {}: copy of {name} failed: {e}",
                            app.name
                        );
                        self.logger.send(ActivityEvent::Error {
                            code: e.code().to_string(),
                            message: format!("app {}: copy of {name} failed: {e}", app.name),
                        });
                        return Ok(CollectionReport {
                            app: app.name.clone(),
                            outcome: CollectionOutcome::CopyFailed {
                                file: name.clone(),
                                error: e.to_string(),
                            },
                            snapshot_dir: Some(snapshot_dir),
                        });
                    }
                }

                if app.empty_origin
                    && let Err(e) = fsops::truncate_file(&src)
                {
                    // The copy already succeeded; truncation failure never
                    // rolls it back.
                    eprintln!(
                        "[LOGVAULT-COLLECT] {}: truncate of {name} failed: {e}",
                        app.name
                    );
                    self.logger.send(ActivityEvent::Error {
                        code: e.code().to_string(),
                        message: format!("app {}: truncate of {name} failed: {e}", app.name),
                    });
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = started.elapsed().as_millis() as u64;
        self.logger.send(ActivityEvent::CollectionCompleted {
            app: app.name.clone(),
            snapshot_dir: snapshot_dir.display().to_string(),
            files,
            bytes,
            duration_ms,
        });

        Ok(CollectionReport {
            app: app.name.clone(),
            outcome: CollectionOutcome::Archived { files, bytes },
            snapshot_dir: Some(snapshot_dir),
        })
    }
}

impl JobRunner for Collector {
    /// Trigger-fire entry point. Every failure is contained here: one app's
    /// errors are logged and never reach the scheduler's trigger set.
    fn run(&self, app: &AppSpec) {
        let global = self.store.current().global.clone();
        if let Err(e) = self.collect(app, &global) {
            eprintln!("[LOGVAULT-COLLECT] {} failed: {e}", app.name);
            self.logger.send(ActivityEvent::Error {
                code: e.code().to_string(),
                message: format!("collection for app {} failed: {e}", app.name),
            });
        }
    }
}
