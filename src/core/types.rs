//! Configuration schema for lanzar.yaml plus run/deploy event types.
//!
//! All config types derive Serialize/Deserialize for YAML roundtripping;
//! omitted fields fall back to the documented defaults.

use serde::{Deserialize, Serialize};

// ============================================================================
// Top-level lanzar.yaml
// ============================================================================

/// Root configuration — everything the deploy, bootstrap, and run
/// operations need about one bot VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanzarConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable deployment name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Compute instance shape and provisioning settings
    pub vm: VmSpec,

    /// Application layout on the instance
    pub app: AppSpec,

    /// System-wide run log path (absolute)
    pub log_path: String,

    /// Cron expression for the scheduled run (five fields)
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

fn default_schedule() -> String {
    "0 9 * * *".to_string()
}

// ============================================================================
// VM
// ============================================================================

/// Compute instance specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSpec {
    /// Cloud project identifier
    pub project: String,

    /// Compute zone
    pub zone: String,

    /// Instance name
    pub instance: String,

    /// Machine shape
    #[serde(default = "default_machine_type")]
    pub machine_type: String,

    /// Boot image family
    #[serde(default = "default_image_family")]
    pub image_family: String,

    /// Boot image project
    #[serde(default = "default_image_project")]
    pub image_project: String,

    /// Boot disk size
    #[serde(default = "default_boot_disk_size")]
    pub boot_disk_size: String,

    /// Boot disk type
    #[serde(default = "default_boot_disk_type")]
    pub boot_disk_type: String,

    /// Access scopes granted to the instance
    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Provisioning CLI program
    #[serde(default = "default_gcloud")]
    pub gcloud: String,

    /// Deletion-completion polling settings
    #[serde(default)]
    pub deletion_poll: PollSpec,
}

fn default_machine_type() -> String {
    "e2-small".to_string()
}

fn default_image_family() -> String {
    "debian-12".to_string()
}

fn default_image_project() -> String {
    "debian-cloud".to_string()
}

fn default_boot_disk_size() -> String {
    "10GB".to_string()
}

fn default_boot_disk_type() -> String {
    "pd-balanced".to_string()
}

fn default_scopes() -> String {
    "cloud-platform".to_string()
}

fn default_gcloud() -> String {
    "gcloud".to_string()
}

/// Bounded polling with exponential backoff, used while waiting for an
/// asynchronous instance deletion to complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSpec {
    /// Maximum describe attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first attempt; doubled after each one
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for PollSpec {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    6
}

fn default_initial_delay_ms() -> u64 {
    2000
}

// ============================================================================
// Application layout
// ============================================================================

/// Where the application lives on the instance and how it is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSpec {
    /// Application root directory (absolute)
    pub dir: String,

    /// Entry point, relative to the application root
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Virtual environment subdirectory name
    #[serde(default = "default_venv")]
    pub venv: String,

    /// Environment file, relative to the application root
    #[serde(default = "default_env_file")]
    pub env_file: String,

    /// Dependency manifest, relative to the application root
    #[serde(default = "default_requirements")]
    pub requirements: String,

    /// Interpreter used to create the virtual environment
    #[serde(default = "default_python")]
    pub python: String,

    /// Absolute path the cron entry invokes
    #[serde(default = "default_runner_bin")]
    pub runner_bin: String,
}

fn default_entry() -> String {
    "main.py".to_string()
}

fn default_venv() -> String {
    "venv".to_string()
}

fn default_env_file() -> String {
    ".env".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_runner_bin() -> String {
    "/usr/local/bin/lanzar".to_string()
}

// ============================================================================
// Events
// ============================================================================

/// Event for the JSONL journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    DeployStarted {
        instance: String,
        run_id: String,
        lanzar_version: String,
    },
    InstanceDeleted {
        instance: String,
        wait_seconds: f64,
    },
    InstanceCreated {
        instance: String,
        zone: String,
        machine_type: String,
    },
    DeployCompleted {
        instance: String,
        run_id: String,
        total_seconds: f64,
    },
    RunStarted {
        run_id: String,
    },
    RunSkipped {
        reason: String,
    },
    RunCompleted {
        run_id: String,
        exit_code: i32,
        duration_seconds: f64,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: Event,
}

// ============================================================================
// Run outcome
// ============================================================================

/// Result of one scheduled-runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Process exit code to propagate to the scheduler
    pub exit_code: i32,

    /// True when the run was skipped because a prior run still holds the lock
    pub skipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_minimal() {
        let yaml = r#"
version: "1.0"
name: flower-bot
vm:
  project: my-project
  zone: us-central1-a
  instance: flower-bot-vm
app:
  dir: /opt/flower-bot
log_path: /var/log/flower-bot.log
"#;
        let config: LanzarConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, "flower-bot");
        assert_eq!(config.schedule, "0 9 * * *");
        assert_eq!(config.vm.machine_type, "e2-small");
        assert_eq!(config.vm.image_family, "debian-12");
        assert_eq!(config.vm.boot_disk_size, "10GB");
        assert_eq!(config.vm.gcloud, "gcloud");
        assert_eq!(config.app.entry, "main.py");
        assert_eq!(config.app.venv, "venv");
        assert_eq!(config.app.env_file, ".env");
        assert_eq!(config.app.runner_bin, "/usr/local/bin/lanzar");
    }

    #[test]
    fn test_config_parse_overrides() {
        let yaml = r#"
version: "1.0"
name: big-bot
vm:
  project: p
  zone: europe-west1-b
  instance: big-bot-vm
  machine_type: e2-medium
  boot_disk_size: 20GB
  deletion_poll:
    max_attempts: 3
    initial_delay_ms: 500
app:
  dir: /srv/big-bot
  entry: bot.py
  venv: .venv
log_path: /var/log/big-bot.log
schedule: "30 6 * * *"
"#;
        let config: LanzarConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.vm.machine_type, "e2-medium");
        assert_eq!(config.vm.deletion_poll.max_attempts, 3);
        assert_eq!(config.vm.deletion_poll.initial_delay_ms, 500);
        assert_eq!(config.app.entry, "bot.py");
        assert_eq!(config.app.venv, ".venv");
        assert_eq!(config.schedule, "30 6 * * *");
    }

    #[test]
    fn test_poll_spec_defaults() {
        let p = PollSpec::default();
        assert_eq!(p.max_attempts, 6);
        assert_eq!(p.initial_delay_ms, 2000);
    }

    #[test]
    fn test_config_roundtrip() {
        let yaml = r#"
version: "1.0"
name: t
vm:
  project: p
  zone: z
  instance: i
app:
  dir: /opt/t
log_path: /var/log/t.log
"#;
        let config: LanzarConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let out = serde_yaml_ng::to_string(&config).unwrap();
        let config2: LanzarConfig = serde_yaml_ng::from_str(&out).unwrap();
        assert_eq!(config2.name, "t");
        assert_eq!(config2.vm.scopes, "cloud-platform");
    }

    #[test]
    fn test_event_serde_tagged() {
        let event = Event::RunCompleted {
            run_id: "r-abc".to_string(),
            exit_code: 3,
            duration_seconds: 1.25,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"run_completed\""));
        assert!(json.contains("\"exit_code\":3"));
    }

    #[test]
    fn test_timestamped_event_flattens() {
        let te = TimestampedEvent {
            ts: "2026-08-24T09:00:00Z".to_string(),
            event: Event::RunSkipped {
                reason: "lock held".to_string(),
            },
        };
        let json = serde_json::to_string(&te).unwrap();
        assert!(json.contains("\"ts\":\"2026-08-24T09:00:00Z\""));
        assert!(json.contains("\"event\":\"run_skipped\""));
        assert!(json.contains("lock held"));
    }
}
