#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use filetime::{FileTime, set_file_mtime};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_logvault") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "logvault.exe" } else { "logvault" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve logvault binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("logvault-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute logvault command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// One app block for [`write_config`].
pub struct AppFixture {
    pub name: String,
    pub log_dir: PathBuf,
    pub log_files: Vec<String>,
    pub empty_origin: bool,
    pub time_zone: String,
    pub start_time: String,
}

impl AppFixture {
    pub fn new(name: &str, log_dir: &Path, log_files: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            log_dir: log_dir.to_path_buf(),
            log_files: log_files.iter().map(ToString::to_string).collect(),
            empty_origin: false,
            time_zone: "UTC".to_string(),
            start_time: "03:00".to_string(),
        }
    }
}

/// Write a logvault config file and return its path.
pub fn write_config(
    path: &Path,
    target_dir: &Path,
    max_size: u64,
    clean_auto: bool,
    apps: &[AppFixture],
) -> PathBuf {
    let mut yaml = format!(
        "global:\n  target_dir: {}\n  max_size: {max_size}\n  max_save_duration: \"7\"\n  min_save_duration: \"2\"\n  clean_auto: {clean_auto}\napps:\n",
        target_dir.display()
    );
    for app in apps {
        yaml.push_str(&format!(
            "  - name: {}\n    log_dir: {}\n    log_files: [{}]\n    empty_origin: {}\n    exec_time:\n      time_zone: {}\n      start_time: \"{}\"\n",
            app.name,
            app.log_dir.display(),
            app.log_files.join(", "),
            app.empty_origin,
            app.time_zone,
            app.start_time,
        ));
    }
    fs::write(path, yaml).expect("write config fixture");
    path.to_path_buf()
}

/// Create a snapshot directory holding `bytes` of payload, aged `age_days`.
pub fn aged_snapshot(target: &Path, name: &str, bytes: usize, age_days: u64) -> PathBuf {
    let dir = target.join(name);
    fs::create_dir_all(&dir).expect("create snapshot fixture");
    fs::write(dir.join("payload.log"), vec![0u8; bytes]).expect("write snapshot payload");

    let mtime = SystemTime::now() - Duration::from_secs(age_days * 86_400 + 3_600);
    set_file_mtime(&dir, FileTime::from_system_time(mtime)).expect("age snapshot dir");
    dir
}

/// Poll `check` until it returns true or `deadline` elapses.
pub fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}
