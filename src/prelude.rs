//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use logvault::prelude::*;
//! ```

// Core
pub use crate::core::config::{AppSpec, Config, Days, GlobalPolicy, Schedule};
pub use crate::core::errors::{LogVaultError, Result};
pub use crate::core::store::ConfigStore;

// Retention
pub use crate::retention::{EnforceReport, QuotaVerdict, RetentionPolicy, enforce};

// Collection
pub use crate::collector::{CollectionOutcome, CollectionReport, Collector};

// Scheduling
pub use crate::schedule::trigger::DailyTrigger;
pub use crate::schedule::{JobRunner, RebuildSummary, Scheduler, TriggerInfo};

// Watcher
pub use crate::watcher::{WatcherOptions, spawn_watcher};

// Lifecycle
pub use crate::daemon::lifecycle::{LogVault, LogVaultOptions};
