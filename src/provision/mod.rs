//! Provisioning: VM deployment driver, first-boot bootstrap payload,
//! and idempotent cron registration.

pub mod bootstrap;
pub mod cron;
pub mod driver;
