//! Core: configuration schema, validation, env-file parsing, the run
//! lock, venv paths, and the scheduled runner.

pub mod envfile;
pub mod lockfile;
pub mod parser;
pub mod runner;
pub mod types;
pub mod venv;
