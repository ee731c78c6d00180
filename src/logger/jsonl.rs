//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` to prevent interleaved partial
//! lines when the file is being tailed by another process.
//!
//! Degradation chain:
//! 1. Primary file path
//! 2. Fallback path (e.g. a RAM-backed location)
//! 3. stderr with `[LOGVAULT-JSONL]` prefix
//! 4. Silent discard (the daemon must never crash for logging failures)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types matching the logvault activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DaemonStart,
    DaemonStop,
    CollectionStart,
    CollectionComplete,
    CollectionSkipped,
    RetentionClean,
    ScheduleRebuilt,
    ScheduleSkipped,
    ConfigReload,
    Error,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Application name (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Affected filesystem path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Files copied or directories deleted by the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<u64>,
    /// Bytes involved in the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    /// Archive tree size in GB at time of event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<f64>,
    /// Duration of the action in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// LV error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            severity,
            app: None,
            path: None,
            items: None,
            bytes: None,
            size_gb: None,
            duration_ms: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Optional fallback path (e.g. on a different filesystem).
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before rotation (bytes).
    pub max_size_bytes: u64,
    /// Number of rotated files to keep.
    pub max_rotated_files: u32,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/logvault/activity.jsonl"),
            fallback_path: Some(PathBuf::from("/tmp/logvault.jsonl")),
            max_size_bytes: 50 * 1024 * 1024,
            max_rotated_files: 5,
        }
    }
}

/// Append-only JSONL log writer with rotation and multi-level fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Write a single log entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[LOGVAULT-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffers.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Force an fsync on the underlying file.
    pub fn fsync(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
            let _ = w.get_ref().sync_data();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Number of bytes written to the current file.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        if self.bytes_written + line.len() as u64 > self.config.max_size_bytes
            && matches!(self.state, WriterState::Normal | WriterState::Fallback)
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line); // retry at next level
                    } else {
                        self.bytes_written += line.len() as u64;
                    }
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[LOGVAULT-JSONL] {line}");
            }
            WriterState::Discard => {}
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, len)) => {
                self.writer = Some(BufWriter::new(file));
                self.state = WriterState::Normal;
                self.bytes_written = len;
            }
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[LOGVAULT-JSONL] cannot open {}: {e}",
                    self.config.path.display()
                );
                self.degrade();
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Discard | WriterState::Normal => {
                if let Some(fallback) = self.config.fallback_path.clone() {
                    match open_append(&fallback) {
                        Ok((file, len)) => {
                            self.writer = Some(BufWriter::new(file));
                            self.bytes_written = len;
                            WriterState::Fallback
                        }
                        Err(_) => WriterState::Stderr,
                    }
                } else {
                    WriterState::Stderr
                }
            }
            WriterState::Fallback => WriterState::Stderr,
            WriterState::Stderr => WriterState::Discard,
        };
    }

    fn rotate(&mut self) {
        let active = match self.state {
            WriterState::Normal => self.config.path.clone(),
            WriterState::Fallback => match self.config.fallback_path.clone() {
                Some(p) => p,
                None => return,
            },
            WriterState::Stderr | WriterState::Discard => return,
        };

        self.flush();
        self.writer = None;

        // Shift activity.jsonl.N -> activity.jsonl.N+1, dropping the oldest.
        for idx in (1..self.config.max_rotated_files).rev() {
            let from = rotated_name(&active, idx);
            let to = rotated_name(&active, idx + 1);
            if from.exists() {
                let _ = rename(&from, &to);
            }
        }
        let _ = rename(&active, rotated_name(&active, 1));

        match open_append(&active) {
            Ok((file, len)) => {
                self.writer = Some(BufWriter::new(file));
                self.bytes_written = len;
            }
            Err(_) => self.degrade(),
        }
    }
}

fn rotated_name(base: &std::path::Path, idx: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{idx}"));
    PathBuf::from(name)
}

fn open_append(path: &std::path::Path) -> io::Result<(File, u64)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry() -> LogEntry {
        let mut e = LogEntry::new(EventType::CollectionComplete, Severity::Info);
        e.app = Some("api".to_string());
        e.items = Some(3);
        e
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("activity.jsonl");
        let mut w = JsonlWriter::open(JsonlConfig {
            path: path.clone(),
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 2,
        });
        w.write_entry(&entry());
        w.write_entry(&entry());
        w.flush();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: LogEntry = serde_json::from_str(line).expect("line should parse");
            assert_eq!(parsed.event, EventType::CollectionComplete);
            assert_eq!(parsed.app.as_deref(), Some("api"));
        }
    }

    #[test]
    fn optional_fields_are_omitted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.jsonl");
        let mut w = JsonlWriter::open(JsonlConfig {
            path: path.clone(),
            fallback_path: None,
            max_size_bytes: 1024,
            max_rotated_files: 1,
        });
        w.write_entry(&LogEntry::new(EventType::DaemonStart, Severity::Info));
        w.flush();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("error_code"));
        assert!(!content.contains("\"app\""));
    }

    #[test]
    fn rotates_at_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("activity.jsonl");
        let mut w = JsonlWriter::open(JsonlConfig {
            path: path.clone(),
            fallback_path: None,
            max_size_bytes: 256,
            max_rotated_files: 3,
        });
        for _ in 0..16 {
            w.write_entry(&entry());
        }
        w.flush();

        assert!(path.exists());
        assert!(rotated_name(&path, 1).exists());
    }

    #[test]
    fn unwritable_primary_falls_back() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("fallback.jsonl");
        let mut w = JsonlWriter::open(JsonlConfig {
            // Primary under a path that cannot be created.
            path: PathBuf::from("/proc/definitely/not/writable/x.jsonl"),
            fallback_path: Some(fallback.clone()),
            max_size_bytes: 1024,
            max_rotated_files: 1,
        });
        assert_eq!(w.state(), "fallback");
        w.write_entry(&entry());
        w.flush();
        assert!(fs::read_to_string(&fallback).unwrap().contains("api"));
    }
}
