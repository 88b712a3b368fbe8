//! Lanzar — deployment automation for a scheduled bot VM.
//!
//! Provisions the compute instance, generates the first-boot payload,
//! registers the daily cron entry, and runs the application under it.

pub mod cli;
pub mod core;
pub mod exec;
pub mod provision;
pub mod runlog;
