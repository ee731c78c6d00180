//! Configuration model: YAML file + env var overrides + validation.
//!
//! A parsed [`Config`] is an immutable snapshot. It is published wholesale
//! through [`crate::core::store::ConfigStore`] and never mutated in place.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::errors::{LogVaultError, Result};

const SECS_PER_DAY: u64 = 86_400;

/// Full logvault configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub global: GlobalPolicy,
    #[serde(default)]
    pub apps: Vec<AppSpec>,
}

/// Archive target and retention thresholds shared by all apps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlobalPolicy {
    /// Root directory of archived snapshots.
    pub target_dir: PathBuf,
    /// Quota on the archive tree, in whole GB.
    pub max_size: u64,
    /// Shallow-clean age in days: the older, conservative threshold tried first.
    pub max_save_duration: Days,
    /// Deep-clean age in days: the younger, aggressive threshold tried second.
    pub min_save_duration: Days,
    /// Whether retention passes may delete snapshots without operator action.
    pub clean_auto: bool,
}

/// One application's log sources and daily collection schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSpec {
    /// Unique key across the snapshot; names the app's archive subdirectory.
    pub name: String,
    /// Source directory the log files live in.
    pub log_dir: PathBuf,
    /// File or subpath names relative to `log_dir`, copied in order.
    #[serde(default)]
    pub log_files: Vec<String>,
    /// Truncate each source file to zero bytes after a successful copy.
    #[serde(default)]
    pub empty_origin: bool,
    /// Daily fire time in the app's own timezone.
    pub exec_time: Schedule,
}

/// IANA timezone name + daily local start time.
///
/// Kept as raw strings here; resolution happens at trigger-build time so a
/// bad zone in one app cannot reject an otherwise valid snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub time_zone: String,
    /// Local daily fire time, `HH:MM`.
    pub start_time: String,
}

/// Day count that deserializes from either a YAML integer or a string
/// (operator configs historically quoted these values).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Days(pub u64);

impl Days {
    /// The age threshold as a wall-clock duration.
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        Duration::from_secs(self.0 * SECS_PER_DAY)
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Days {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DaysVisitor;

        impl Visitor<'_> for DaysVisitor {
            type Value = Days;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative day count as integer or string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Days, E> {
                Ok(Days(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Days, E> {
                u64::try_from(v)
                    .map(Days)
                    .map_err(|_| E::custom(format!("day count must be >= 0, got {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Days, E> {
                v.trim()
                    .parse::<u64>()
                    .map(Days)
                    .map_err(|e| E::custom(format!("day count {v:?}: {e}")))
            }
        }

        deserializer.deserialize_any(DaysVisitor)
    }
}

impl GlobalPolicy {
    /// Quota threshold in bytes.
    #[must_use]
    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size * 1024 * 1024 * 1024
    }

    /// Shallow-clean age threshold.
    #[must_use]
    pub const fn shallow_age(&self) -> Duration {
        self.max_save_duration.as_duration()
    }

    /// Deep-clean age threshold.
    #[must_use]
    pub const fn deep_age(&self) -> Duration {
        self.min_save_duration.as_duration()
    }
}

impl Config {
    /// Default configuration path: `$HOME/.config/logvault/config.yaml`,
    /// falling back to `/etc/logvault/config.yaml` when HOME is unset.
    #[must_use]
    pub fn default_path() -> PathBuf {
        env::var_os("HOME").map_or_else(
            || PathBuf::from("/etc/logvault/config.yaml"),
            |home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("logvault")
                    .join("config.yaml")
            },
        )
    }

    /// Load config from a file, apply env overrides, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LogVaultError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| LogVaultError::io(path, source))?;
        let mut cfg: Self = serde_yaml::from_str(&raw)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for reload no-op detection
    /// and logging. FNV-1a over the canonical JSON form, stable across
    /// processes and Rust releases.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(env_var)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("LOGVAULT_TARGET_DIR") {
            self.global.target_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("LOGVAULT_MAX_SIZE_GB") {
            self.global.max_size =
                raw.parse::<u64>()
                    .map_err(|error| LogVaultError::ConfigParse {
                        context: "env",
                        details: format!("LOGVAULT_MAX_SIZE_GB={raw:?}: {error}"),
                    })?;
        }
        if let Some(raw) = lookup("LOGVAULT_CLEAN_AUTO") {
            self.global.clean_auto =
                raw.parse::<bool>()
                    .map_err(|error| LogVaultError::ConfigParse {
                        context: "env",
                        details: format!("LOGVAULT_CLEAN_AUTO={raw:?}: {error}"),
                    })?;
        }
        Ok(())
    }

    /// Snapshot-level validation.
    ///
    /// Per-app timezone/start-time parsing is deliberately excluded: those
    /// failures skip one app at trigger-build time instead of rejecting the
    /// whole snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.global.target_dir.as_os_str().is_empty() {
            return Err(LogVaultError::InvalidConfig {
                details: "global.target_dir must not be empty".to_string(),
            });
        }
        if self.global.max_size == 0 {
            return Err(LogVaultError::InvalidConfig {
                details: "global.max_size must be >= 1 GB".to_string(),
            });
        }
        if self.global.min_save_duration.0 == 0 {
            return Err(LogVaultError::InvalidConfig {
                details: "global.min_save_duration must be >= 1 day".to_string(),
            });
        }
        if self.global.min_save_duration > self.global.max_save_duration {
            return Err(LogVaultError::InvalidConfig {
                details: format!(
                    "global.min_save_duration ({}) must be <= global.max_save_duration ({})",
                    self.global.min_save_duration, self.global.max_save_duration
                ),
            });
        }

        let mut seen = HashSet::with_capacity(self.apps.len());
        for app in &self.apps {
            if app.name.trim().is_empty() {
                return Err(LogVaultError::InvalidConfig {
                    details: "apps[].name must not be empty".to_string(),
                });
            }
            if !seen.insert(app.name.as_str()) {
                return Err(LogVaultError::InvalidConfig {
                    details: format!("duplicate app name: {}", app.name),
                });
            }
            if app.log_dir.as_os_str().is_empty() {
                return Err(LogVaultError::InvalidConfig {
                    details: format!("app {}: log_dir must not be empty", app.name),
                });
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}
