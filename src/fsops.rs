//! Native filesystem primitives: recursive size, recursive copy, recursive
//! delete, and true truncate-to-zero.
//!
//! These deliberately never shell out to `du`/`cp`/`rm`/`truncate`; output
//! parsing and quoting are a whole failure class this crate does not have.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::core::errors::{LogVaultError, Result};

/// Recursive disk usage of `path` in bytes (sum of file lengths).
///
/// A nonexistent root is an error, never "zero usage" — a quota check
/// against a missing archive tree must fail loudly.
pub fn dir_size_bytes(path: &Path) -> Result<u64> {
    let meta = fs::symlink_metadata(path).map_err(|source| LogVaultError::Measure {
        path: path.to_path_buf(),
        details: source.to_string(),
    })?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }

    let mut total: u64 = 0;
    let entries = fs::read_dir(path).map_err(|source| LogVaultError::Measure {
        path: path.to_path_buf(),
        details: source.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| LogVaultError::Measure {
            path: path.to_path_buf(),
            details: source.to_string(),
        })?;
        // Entries can vanish mid-walk (a concurrent retention pass); skip them.
        let Ok(meta) = entry.metadata() else { continue };
        if meta.is_dir() {
            match dir_size_bytes(&entry.path()) {
                Ok(sub) => total += sub,
                Err(_) if !entry.path().exists() => {}
                Err(e) => return Err(e),
            }
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Copy a file or directory tree from `src` into `dst`, returning bytes copied.
///
/// `dst` is the full destination path (not the parent). Directory copies
/// mirror the source tree; symlinked entries are skipped.
pub fn copy_recursive(src: &Path, dst: &Path) -> Result<u64> {
    let meta = fs::symlink_metadata(src).map_err(|source| LogVaultError::io(src, source))?;
    if meta.is_symlink() {
        return Ok(0);
    }
    if meta.is_file() {
        // Subpath sources need their destination parent in place.
        if let Some(parent) = dst.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LogVaultError::io(parent, source))?;
        }
        return fs::copy(src, dst).map_err(|source| LogVaultError::io(src, source));
    }

    fs::create_dir_all(dst).map_err(|source| LogVaultError::io(dst, source))?;
    let mut total: u64 = 0;
    let entries = fs::read_dir(src).map_err(|source| LogVaultError::io(src, source))?;
    for entry in entries {
        let entry = entry.map_err(|source| LogVaultError::io(src, source))?;
        total += copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
    }
    Ok(total)
}

/// Remove a file or directory tree.
pub fn remove_recursive(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|source| LogVaultError::io(path, source))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(|source| LogVaultError::io(path, source))
    } else {
        fs::remove_file(path).map_err(|source| LogVaultError::io(path, source))
    }
}

/// Truncate an existing file to zero bytes in place.
///
/// Opens with `write + truncate` so the content is actually emptied — never
/// a shell redirect that can leave literal placeholder bytes behind.
pub fn truncate_file(path: &Path) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| LogVaultError::io(path, source))?;
    Ok(())
}
