//! Daemon subsystem: lifecycle assembly and signal handling.

pub mod lifecycle;
#[cfg(feature = "daemon")]
pub mod signals;
