//! LV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LogVaultError>;

/// Top-level error type for logvault.
#[derive(Debug, Error)]
pub enum LogVaultError {
    #[error("[LV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LV-1101] invalid schedule for app {app}: {details}")]
    InvalidSchedule { app: String, details: String },

    #[error("[LV-2001] usage measurement failure for {path}: {details}")]
    Measure { path: PathBuf, details: String },

    #[error("[LV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LV-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[LV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl LogVaultError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LV-1001",
            Self::MissingConfig { .. } => "LV-1002",
            Self::ConfigParse { .. } => "LV-1003",
            Self::InvalidSchedule { .. } => "LV-1101",
            Self::Measure { .. } => "LV-2001",
            Self::Serialization { .. } => "LV-2101",
            Self::Io { .. } => "LV-3002",
            Self::ChannelClosed { .. } => "LV-3003",
            Self::Runtime { .. } => "LV-3900",
        }
    }

    /// Whether retrying (e.g. on the next scheduled fire) might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Measure { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for LogVaultError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for LogVaultError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::ConfigParse {
            context: "yaml",
            details: value.to_string(),
        }
    }
}
