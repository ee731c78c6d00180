//! Top-level CLI definition and dispatch.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use logvault::core::config::Config;
use logvault::core::errors::Result;
use logvault::daemon::lifecycle::{LogVault, LogVaultOptions};
use logvault::daemon::signals::SignalHandler;
use logvault::logger::jsonl::JsonlConfig;
use logvault::schedule::trigger::DailyTrigger;

/// Interval at which the host loop polls the signal flags.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// logvault — scheduled log archival with quota-driven retention.
#[derive(Debug, Parser)]
#[command(
    name = "logvault",
    author,
    version,
    about = "logvault - scheduled log archival daemon",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the collection daemon in the foreground.
    Run(RunArgs),
    /// Validate the configuration and print the derived schedule.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Activity log path (JSONL). Defaults to /var/lib/logvault/activity.jsonl.
    #[arg(long, value_name = "PATH")]
    activity_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct CheckArgs {}

/// Dispatch the parsed CLI.
pub fn run(cli: &Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    match &cli.command {
        Command::Run(args) => run_daemon(&config_path, args),
        Command::Check(_) => check_config(&config_path),
    }
}

fn run_daemon(config_path: &std::path::Path, args: &RunArgs) -> Result<()> {
    let jsonl = args.activity_log.as_ref().map_or_else(JsonlConfig::default, |path| JsonlConfig {
        path: path.clone(),
        ..JsonlConfig::default()
    });

    let signals = SignalHandler::new();
    let mut vault = LogVault::start(
        config_path,
        LogVaultOptions {
            jsonl: Some(jsonl),
            ..LogVaultOptions::default()
        },
    )?;

    println!("logvault is running. Press Ctrl+C to exit.");
    loop {
        if signals.should_shutdown() {
            eprintln!("[LOGVAULT] shutdown signal received");
            break;
        }
        if signals.should_reload() {
            vault.reload_now();
        }
        thread::sleep(SIGNAL_POLL_INTERVAL);
    }

    vault.stop();
    Ok(())
}

fn check_config(config_path: &std::path::Path) -> Result<()> {
    let config = Config::load(config_path)?;
    println!("configuration OK: {}", config_path.display());
    println!(
        "  target_dir={} max_size={}GB shallow={}d deep={}d clean_auto={}",
        config.global.target_dir.display(),
        config.global.max_size,
        config.global.max_save_duration,
        config.global.min_save_duration,
        config.global.clean_auto
    );

    for app in &config.apps {
        match DailyTrigger::from_spec(app) {
            Ok(trigger) => {
                println!("  app {:<20} daily at {}", app.name, trigger.describe());
            }
            Err(e) => {
                println!("  app {:<20} SKIPPED: {e}", app.name);
            }
        }
    }
    Ok(())
}
