//! YAML parsing and validation for lanzar.yaml.
//!
//! Structural constraints:
//! - Version must be "1.0"
//! - Project, zone, and instance must be non-empty
//! - Instance name must match the compute naming charset
//! - Application root and log path must be absolute
//! - Schedule must be a five-field cron expression

use super::types::LanzarConfig;
use regex::Regex;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a lanzar.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<LanzarConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a lanzar.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<LanzarConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &LanzarConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        push(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        ));
    }

    if config.name.is_empty() {
        push("name must not be empty".to_string());
    }

    if config.vm.project.is_empty() {
        push("vm.project must not be empty".to_string());
    }
    if config.vm.zone.is_empty() {
        push("vm.zone must not be empty".to_string());
    }
    if config.vm.instance.is_empty() {
        push("vm.instance must not be empty".to_string());
    } else if !instance_name_re().is_match(&config.vm.instance) {
        push(format!(
            "vm.instance \"{}\" is not a valid instance name (lowercase letters, digits, hyphens; must start with a letter)",
            config.vm.instance
        ));
    }

    if config.vm.deletion_poll.max_attempts == 0 {
        push("vm.deletion_poll.max_attempts must be at least 1".to_string());
    }

    if !config.app.dir.starts_with('/') {
        push(format!("app.dir must be absolute, got \"{}\"", config.app.dir));
    }
    if !config.log_path.starts_with('/') {
        push(format!(
            "log_path must be absolute, got \"{}\"",
            config.log_path
        ));
    }

    if !is_valid_schedule(&config.schedule) {
        push(format!(
            "schedule \"{}\" is not a five-field cron expression",
            config.schedule
        ));
    }

    errors
}

fn instance_name_re() -> Regex {
    Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("static regex")
}

/// Check a cron expression: exactly five fields drawn from the
/// digit/star/comma/slash/hyphen charset.
fn is_valid_schedule(schedule: &str) -> bool {
    let field = Regex::new(r"^[0-9*,/-]+$").expect("static regex");
    let fields: Vec<&str> = schedule.split_whitespace().collect();
    fields.len() == 5 && fields.iter().all(|f| field.is_match(f))
}
