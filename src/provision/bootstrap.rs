//! First-boot bootstrap — payload generation and local application.
//!
//! The generated script runs once as the instance's startup payload:
//! packages, application directory, virtual environment, dependencies,
//! log and env files, runner permissions, cron registration. Each step
//! is fail-fast; re-running converges because every step is guarded.

use super::cron;
use crate::core::types::LanzarConfig;
use crate::core::venv;
use crate::exec;

/// One bootstrap step.
pub struct BootstrapStep {
    pub name: &'static str,
    pub action: StepAction,
}

/// How a step is carried out.
pub enum StepAction {
    /// A shell snippet, embedded in the payload and executed via bash locally.
    Shell(String),
    /// Cron registration: shell idiom in the payload, native merge locally.
    CronRegistration,
}

/// The ordered bootstrap steps for a configuration.
pub fn steps(config: &LanzarConfig) -> Vec<BootstrapStep> {
    let app = &config.app;
    let dir = &app.dir;
    let log = &config.log_path;
    let venv_dir = venv::venv_dir(app);
    let pip = venv::pip_bin(app);

    vec![
        BootstrapStep {
            name: "system packages",
            action: StepAction::Shell(
                "apt-get update -qq\n\
                 apt-get upgrade -y -qq\n\
                 apt-get install -y -qq python3 python3-pip python3-venv build-essential"
                    .to_string(),
            ),
        },
        BootstrapStep {
            name: "application directory",
            action: StepAction::Shell(format!("mkdir -p '{}'", dir)),
        },
        BootstrapStep {
            name: "virtual environment",
            action: StepAction::Shell(format!(
                "if [ ! -d '{venv}' ]; then\n  {python} -m venv '{venv}'\nfi",
                venv = venv_dir.display(),
                python = app.python
            )),
        },
        BootstrapStep {
            name: "log file",
            action: StepAction::Shell(format!("touch '{log}'\nchmod 0666 '{log}'")),
        },
        BootstrapStep {
            name: "dependencies",
            // The manifest is placed by a separate upload step; its absence
            // must not block the remaining bootstrap
            action: StepAction::Shell(format!(
                "if [ -f '{dir}/{req}' ]; then\n\
                 \x20 '{pip}' install -q -r '{dir}/{req}'\n\
                 else\n\
                 \x20 echo \"[$(date -u +%FT%TZ)] WARNING: {dir}/{req} not found, skipping dependency install\" >> '{log}'\n\
                 fi",
                req = app.requirements,
                pip = pip.display()
            )),
        },
        BootstrapStep {
            name: "env file",
            action: StepAction::Shell(format!(
                "if [ ! -f '{dir}/{env}' ]; then\n\
                 \x20 touch '{dir}/{env}'\n\
                 \x20 chmod 0600 '{dir}/{env}'\n\
                 fi",
                env = app.env_file
            )),
        },
        BootstrapStep {
            name: "runner binary",
            action: StepAction::Shell(format!(
                "if [ -f '{bin}' ]; then\n  chmod 0755 '{bin}'\nfi",
                bin = app.runner_bin
            )),
        },
        BootstrapStep {
            name: "cron registration",
            action: StepAction::CronRegistration,
        },
        BootstrapStep {
            name: "completion marker",
            action: StepAction::Shell(format!(
                "echo \"[$(date -u +%FT%TZ)] bootstrap complete\" >> '{log}'"
            )),
        },
    ]
}

/// Render the full first-boot payload for the instance metadata.
pub fn startup_script(config: &LanzarConfig) -> String {
    let mut script = String::from(
        "#!/bin/bash\nset -euo pipefail\nexport DEBIAN_FRONTEND=noninteractive\n",
    );
    for step in steps(config) {
        script.push('\n');
        script.push_str("# ");
        script.push_str(step.name);
        script.push('\n');
        match step.action {
            StepAction::Shell(snippet) => script.push_str(&snippet),
            StepAction::CronRegistration => {
                script.push_str(&cron::registration_snippet(config))
            }
        }
        script.push('\n');
    }
    script
}

/// Apply the bootstrap steps on the local host — the manual-remediation
/// path after a failed first boot or a late file upload.
pub fn apply_local(config: &LanzarConfig) -> Result<(), String> {
    for step in steps(config) {
        println!("bootstrap: {}", step.name);
        match step.action {
            StepAction::Shell(snippet) => {
                let out = exec::exec_script(&format!("set -euo pipefail\n{}", snippet))?;
                if !out.success() {
                    return Err(format!(
                        "bootstrap step '{}' failed (exit {}): {}",
                        step.name,
                        out.exit_code,
                        out.stderr.trim()
                    ));
                }
            }
            StepAction::CronRegistration => cron::install_local(config)?,
        }
    }
    Ok(())
}
