//! Retention Engine: quota measurement + two escalating age-based deletion
//! passes over snapshot directories.
//!
//! Pipeline: measure usage -> under quota? done -> auto-clean permitted?
//! -> shallow pass (older, conservative age) -> re-measure -> deep pass
//! (younger, aggressive age) only if still over -> final verdict.
//!
//! No third pass is ever attempted; a tree still over quota after both
//! passes is surfaced as a condition for the caller to report, bounding
//! deletion risk.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::core::config::GlobalPolicy;
use crate::core::errors::Result;
use crate::fsops;

/// Thresholds the engine enforces, derived from [`GlobalPolicy`].
///
/// Kept in bytes/durations (not GB/days) so tests can exercise the passes
/// with small trees and short ages.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Quota on the archive tree.
    pub max_bytes: u64,
    /// Shallow-clean age: the older, conservative threshold tried first.
    pub shallow_age: Duration,
    /// Deep-clean age: the younger, aggressive threshold tried second.
    pub deep_age: Duration,
    /// Whether the engine may delete at all.
    pub auto_clean: bool,
}

impl RetentionPolicy {
    /// Derive the enforcement thresholds from the configured global policy.
    #[must_use]
    pub fn from_global(global: &GlobalPolicy) -> Self {
        Self {
            max_bytes: global.max_size_bytes(),
            shallow_age: global.shallow_age(),
            deep_age: global.deep_age(),
            auto_clean: global.clean_auto,
        }
    }
}

/// Outcome of a quota check, surfaced as a state rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaVerdict {
    /// Usage was below quota; nothing was deleted.
    Under,
    /// Usage is at/above quota and `auto_clean` is disabled; an operator
    /// must intervene. Nothing was deleted.
    ManualCleanupRequired,
    /// Deletion passes brought usage back under quota.
    CleanedUnder,
    /// Both passes ran and usage is still at/above quota.
    StillOverQuota,
}

impl QuotaVerdict {
    /// Whether a collection copy may proceed after this verdict.
    #[must_use]
    pub const fn allows_collection(self) -> bool {
        matches!(self, Self::Under | Self::CleanedUnder)
    }
}

/// Report of one enforcement run.
#[derive(Debug)]
pub struct EnforceReport {
    pub verdict: QuotaVerdict,
    /// Tree usage after the run (after the final re-measure when cleaning ran).
    pub final_size_bytes: u64,
    /// Whether any deletion pass executed.
    pub cleaned: bool,
    /// Snapshot directories removed across both passes.
    pub dirs_deleted: u64,
    /// Per-directory deletion failures; siblings were still attempted.
    pub errors: Vec<(PathBuf, String)>,
}

impl EnforceReport {
    /// Final usage in GB, for reporting.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn final_size_gb(&self) -> f64 {
        self.final_size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// Measure `target_dir` and apply the two-tier retention policy.
///
/// A nonexistent target directory is an error — never treated as zero usage.
pub fn enforce(target_dir: &Path, policy: &RetentionPolicy) -> Result<EnforceReport> {
    let mut size = fsops::dir_size_bytes(target_dir)?;
    if size < policy.max_bytes {
        return Ok(EnforceReport {
            verdict: QuotaVerdict::Under,
            final_size_bytes: size,
            cleaned: false,
            dirs_deleted: 0,
            errors: Vec::new(),
        });
    }

    if !policy.auto_clean {
        return Ok(EnforceReport {
            verdict: QuotaVerdict::ManualCleanupRequired,
            final_size_bytes: size,
            cleaned: false,
            dirs_deleted: 0,
            errors: Vec::new(),
        });
    }

    let now = SystemTime::now();
    let mut dirs_deleted = 0;
    let mut errors = Vec::new();

    // Pass 1: shallow age. Re-measure only after the whole pass completes.
    let (deleted, mut pass_errors) = delete_aged_dirs(target_dir, policy.shallow_age, now)?;
    dirs_deleted += deleted;
    errors.append(&mut pass_errors);
    size = fsops::dir_size_bytes(target_dir)?;

    // Pass 2: deep age, only if the shallow pass was not enough.
    if size >= policy.max_bytes {
        let (deleted, mut pass_errors) = delete_aged_dirs(target_dir, policy.deep_age, now)?;
        dirs_deleted += deleted;
        errors.append(&mut pass_errors);
        size = fsops::dir_size_bytes(target_dir)?;
    }

    let verdict = if size >= policy.max_bytes {
        QuotaVerdict::StillOverQuota
    } else {
        QuotaVerdict::CleanedUnder
    };

    Ok(EnforceReport {
        verdict,
        final_size_bytes: size,
        cleaned: true,
        dirs_deleted,
        errors,
    })
}

/// Delete every immediate subdirectory of `target_dir` whose modification
/// time is older than `age`. One failed deletion does not stop siblings.
fn delete_aged_dirs(
    target_dir: &Path,
    age: Duration,
    now: SystemTime,
) -> Result<(u64, Vec<(PathBuf, String)>)> {
    let mut deleted = 0;
    let mut errors = Vec::new();

    let entries = fs::read_dir(target_dir)
        .map_err(|source| crate::core::errors::LogVaultError::io(target_dir, source))?;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_dir() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let Ok(elapsed) = now.duration_since(modified) else {
            // Future mtime: clock skew, leave it alone.
            continue;
        };
        if elapsed <= age {
            continue;
        }
        match fsops::remove_recursive(&path) {
            Ok(()) => deleted += 1,
            Err(e) => errors.push((path, e.to_string())),
        }
    }

    Ok((deleted, errors))
}
