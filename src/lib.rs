#![forbid(unsafe_code)]

//! logvault — scheduled log archival with quota-driven retention.
//!
//! The engine does three things:
//! 1. **Collect** — per application, copy configured log files into a
//!    timestamped snapshot directory once a day at a local time in the
//!    app's own timezone
//! 2. **Retain** — keep the archive tree under a size quota with two
//!    escalating age-based deletion passes
//! 3. **Reload** — pick up configuration changes at runtime and rebuild the
//!    schedule without losing in-flight jobs
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use logvault::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use logvault::core::config::Config;
//! use logvault::schedule::trigger::DailyTrigger;
//! ```

pub mod prelude;

pub mod collector;
pub mod core;
pub mod daemon;
pub mod fsops;
pub mod logger;
pub mod retention;
pub mod schedule;
pub mod watcher;
