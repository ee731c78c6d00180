//! Config Store: the published configuration snapshot behind a read/write lock.
//!
//! Readers (scheduler rebuild, collection jobs) clone an `Arc<Config>` under
//! the read lock; the writer (watcher reload, SIGHUP path) blocks only for
//! the pointer swap. Nobody ever observes a half-written snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::config::Config;
use crate::core::errors::Result;

/// Owns the config file path and the currently published snapshot.
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<Config>>,
}

impl ConfigStore {
    /// Load the initial snapshot from `path` and publish it.
    ///
    /// An initial load failure is returned to the caller — the process
    /// cannot start without one valid snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let initial = Config::load(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// The config file path this store reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<Config> {
        Arc::clone(&self.current.read())
    }

    /// Read and validate a candidate snapshot without publishing it.
    ///
    /// On failure the previously published snapshot is untouched.
    pub fn load_candidate(&self) -> Result<Config> {
        Config::load(&self.path)
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, snapshot: Config) {
        *self.current.write() = Arc::new(snapshot);
    }

    /// Reload from disk and publish if the effective config changed.
    ///
    /// Returns `true` when a new snapshot was published. A reload that
    /// parses to an identical config is a no-op so callers can skip the
    /// scheduler rebuild.
    pub fn reload(&self) -> Result<bool> {
        let candidate = self.load_candidate()?;
        let new_hash = candidate.stable_hash()?;
        let old_hash = self.current().stable_hash()?;
        if new_hash == old_hash {
            return Ok(false);
        }
        self.publish(candidate);
        Ok(true)
    }
}
