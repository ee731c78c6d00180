//! Scheduler: owns the active trigger set and the dispatch thread.
//!
//! Architecture: one dispatch thread sleeps until the earliest armed fire
//! instant (or a control command, whichever comes first) and spawns a
//! dedicated job thread per due application, so a slow copy for one app
//! never delays another app's fire time.
//!
//! `rebuild` replaces the whole trigger set synchronously (command + ack over
//! a crossbeam channel): once it returns, no trigger from the replaced set
//! can fire. `rebuild` and `stop` are serialized by an internal mutex.

#![allow(missing_docs)]

pub mod trigger;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::{Mutex, RwLock};

use crate::core::config::{AppSpec, Config};
use crate::core::errors::{LogVaultError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::schedule::trigger::DailyTrigger;

/// Upper bound on one dispatch sleep. Re-deriving the deadline once a minute
/// keeps fire times correct across suspend/resume and wall-clock jumps.
const MAX_DISPATCH_SLEEP: Duration = Duration::from_secs(60);

/// Executes one application's collection when its trigger fires.
///
/// The production implementation is `collector::Collector`; tests substitute
/// a recording runner.
pub trait JobRunner: Send + Sync {
    /// Run the job for `app`. Errors are contained inside the runner — a
    /// failing job must never destabilize the trigger set.
    fn run(&self, app: &AppSpec);
}

/// Summary of one rebuild pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildSummary {
    /// Apps with a valid trigger installed.
    pub scheduled: usize,
    /// Apps skipped for unparsable timezone or start time.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedState {
    Idle,
    Running,
    Stopped,
}

enum Command {
    Replace {
        triggers: Vec<DailyTrigger>,
        ack: Sender<()>,
    },
    Stop {
        ack: Sender<()>,
    },
}

/// Descriptor of one installed trigger, for introspection and `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerInfo {
    pub app: String,
    /// Human-readable schedule, e.g. `02:30 Asia/Shanghai`.
    pub schedule: String,
}

/// The scheduler: trigger set owner and dispatch thread supervisor.
pub struct Scheduler {
    runner: Arc<dyn JobRunner>,
    logger: ActivityLoggerHandle,
    state: Mutex<SchedState>,
    /// Serializes `rebuild` against itself and against `stop`.
    control: Mutex<ControlPlane>,
    /// Observable copy of the installed set; the dispatch thread owns the
    /// live one.
    installed: RwLock<Vec<TriggerInfo>>,
}

struct ControlPlane {
    cmd_tx: Option<Sender<Command>>,
    dispatch: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Create a scheduler in the initial (not yet running) state.
    pub fn new(runner: Arc<dyn JobRunner>, logger: ActivityLoggerHandle) -> Self {
        Self {
            runner,
            logger,
            state: Mutex::new(SchedState::Idle),
            control: Mutex::new(ControlPlane {
                cmd_tx: None,
                dispatch: None,
            }),
            installed: RwLock::new(Vec::new()),
        }
    }

    /// Spawn the dispatch thread with an empty trigger set and enter Running.
    ///
    /// Lock order is control, then state — the same as `rebuild` and `stop`.
    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock();
        let mut state = self.state.lock();
        match *state {
            SchedState::Running => {
                return Err(LogVaultError::Runtime {
                    details: "scheduler already running".to_string(),
                });
            }
            SchedState::Stopped => {
                return Err(LogVaultError::Runtime {
                    details: "scheduler already stopped".to_string(),
                });
            }
            SchedState::Idle => {}
        }

        let (cmd_tx, cmd_rx) = bounded::<Command>(1);
        let runner = Arc::clone(&self.runner);
        let logger = self.logger.clone();
        let join = thread::Builder::new()
            .name("logvault-dispatch".to_string())
            .spawn(move || dispatch_main(&cmd_rx, &runner, &logger))
            .map_err(|e| LogVaultError::Runtime {
                details: format!("failed to spawn dispatch thread: {e}"),
            })?;

        control.cmd_tx = Some(cmd_tx);
        control.dispatch = Some(join);
        *state = SchedState::Running;
        Ok(())
    }

    /// Atomically replace the whole trigger set from `snapshot`.
    ///
    /// Specs whose timezone or start time fails to parse are skipped with a
    /// logged warning; their omission does not abort the rebuild of other
    /// specs. Once this returns, no trigger from the previous set can fire.
    pub fn rebuild(&self, snapshot: &Config) -> Result<RebuildSummary> {
        let control = self.control.lock();
        if *self.state.lock() != SchedState::Running {
            return Err(LogVaultError::Runtime {
                details: "scheduler is not running".to_string(),
            });
        }

        let mut triggers = Vec::with_capacity(snapshot.apps.len());
        let mut skipped = 0usize;
        for app in &snapshot.apps {
            match DailyTrigger::from_spec(app) {
                Ok(t) => triggers.push(t),
                Err(e) => {
                    skipped += 1;
                    eprintln!("[LOGVAULT-SCHED] skipping app {}: {e}", app.name);
                    self.logger.send(ActivityEvent::ScheduleSkipped {
                        app: app.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let info: Vec<TriggerInfo> = triggers
            .iter()
            .map(|t| TriggerInfo {
                app: t.app().to_string(),
                schedule: t.describe(),
            })
            .collect();
        let summary = RebuildSummary {
            scheduled: triggers.len(),
            skipped,
        };

        let (ack_tx, ack_rx) = bounded::<()>(1);
        let cmd_tx = control
            .cmd_tx
            .as_ref()
            .ok_or(LogVaultError::ChannelClosed {
                component: "scheduler-dispatch",
            })?;
        cmd_tx
            .send(Command::Replace {
                triggers,
                ack: ack_tx,
            })
            .map_err(|_| LogVaultError::ChannelClosed {
                component: "scheduler-dispatch",
            })?;
        ack_rx.recv().map_err(|_| LogVaultError::ChannelClosed {
            component: "scheduler-dispatch",
        })?;

        *self.installed.write() = info;
        self.logger.send(ActivityEvent::ScheduleRebuilt {
            apps_scheduled: summary.scheduled,
            apps_skipped: summary.skipped,
        });
        Ok(summary)
    }

    /// Cancel all triggers and terminate the dispatch thread.
    ///
    /// No fires occur after this returns; in-flight jobs run to completion.
    /// Idempotent.
    pub fn stop(&self) {
        let mut control = self.control.lock();
        let mut state = self.state.lock();
        if *state != SchedState::Running {
            *state = SchedState::Stopped;
            return;
        }

        if let Some(cmd_tx) = control.cmd_tx.take() {
            let (ack_tx, ack_rx) = bounded::<()>(1);
            if cmd_tx.send(Command::Stop { ack: ack_tx }).is_ok() {
                let _ = ack_rx.recv();
            }
        }
        if let Some(join) = control.dispatch.take() {
            let _ = join.join();
        }
        self.installed.write().clear();
        *state = SchedState::Stopped;
    }

    /// Whether the dispatch thread is live.
    pub fn is_running(&self) -> bool {
        *self.state.lock() == SchedState::Running
    }

    /// Names of apps with an installed trigger.
    pub fn active_apps(&self) -> Vec<String> {
        self.installed.read().iter().map(|t| t.app.clone()).collect()
    }

    /// Installed trigger descriptors.
    pub fn installed_triggers(&self) -> Vec<TriggerInfo> {
        self.installed.read().clone()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// ──────────────────── dispatch thread ────────────────────

struct ArmedTrigger {
    trigger: DailyTrigger,
    next_fire: chrono::DateTime<Utc>,
}

fn dispatch_main(
    cmd_rx: &Receiver<Command>,
    runner: &Arc<dyn JobRunner>,
    logger: &ActivityLoggerHandle,
) {
    let mut armed: Vec<ArmedTrigger> = Vec::new();

    loop {
        // Fire everything due, re-arming each trigger for its next day.
        let now = Utc::now();
        for t in &mut armed {
            if t.next_fire <= now {
                fire(runner, logger, t.trigger.spec());
                t.next_fire = t.trigger.next_fire_after(now);
            }
        }

        let sleep = armed
            .iter()
            .map(|t| t.next_fire)
            .min()
            .map_or(MAX_DISPATCH_SLEEP, |next| {
                (next - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .min(MAX_DISPATCH_SLEEP)
            });

        match cmd_rx.recv_timeout(sleep) {
            Ok(Command::Replace { triggers, ack }) => {
                let now = Utc::now();
                armed = triggers
                    .into_iter()
                    .map(|trigger| ArmedTrigger {
                        next_fire: trigger.next_fire_after(now),
                        trigger,
                    })
                    .collect();
                let _ = ack.send(());
            }
            Ok(Command::Stop { ack }) => {
                armed.clear();
                let _ = ack.send(());
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Spawn one job thread for a due application. The closure holds its own
/// immutable spec copy; a spawn failure is logged and local to this fire.
fn fire(runner: &Arc<dyn JobRunner>, logger: &ActivityLoggerHandle, spec: &AppSpec) {
    logger.send(ActivityEvent::CollectionStarted {
        app: spec.name.clone(),
    });
    eprintln!("[LOGVAULT-SCHED] firing collection for app {}", spec.name);

    let runner = Arc::clone(runner);
    let app_name = spec.name.clone();
    let spec = spec.clone();
    let spawned = thread::Builder::new()
        .name(format!("logvault-job-{app_name}"))
        .spawn(move || runner.run(&spec));
    if let Err(e) = spawned {
        eprintln!("[LOGVAULT-SCHED] failed to spawn job thread for {app_name}: {e}");
        logger.send(ActivityEvent::Error {
            code: "LV-3900".to_string(),
            message: format!("failed to spawn job thread for {app_name}: {e}"),
        });
    }
}
