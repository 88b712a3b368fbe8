//! Scheduled runner — prerequisite checks, env-file injection, subprocess
//! invocation, log markers, verbatim exit-code propagation.
//!
//! No retries: a failed run logs and exits; the next scheduled invocation
//! is the only retry mechanism. An overlapping prior run is skipped, not
//! queued.

use super::types::{Event, LanzarConfig, RunOutcome};
use super::{envfile, lockfile, venv};
use crate::runlog;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Execute one scheduled run. The returned exit code is the child's,
/// verbatim, so the external scheduler can observe failure.
pub fn run(config: &LanzarConfig) -> Result<RunOutcome, String> {
    let app = &config.app;
    let log = Path::new(&config.log_path);
    let dir = Path::new(&app.dir);

    if !dir.is_dir() {
        runlog::append_line(
            log,
            &format!("ERROR: application directory {} is missing", app.dir),
        )?;
        return Ok(RunOutcome {
            exit_code: 1,
            skipped: false,
        });
    }

    let venv_dir = venv::venv_dir(app);
    if !venv_dir.is_dir() {
        runlog::append_line(
            log,
            &format!("ERROR: virtual environment {} is missing", venv_dir.display()),
        )?;
        return Ok(RunOutcome {
            exit_code: 1,
            skipped: false,
        });
    }

    let env_path = dir.join(&app.env_file);
    let vars = if env_path.is_file() {
        match envfile::load(&env_path) {
            Ok(vars) => vars,
            Err(e) => {
                runlog::append_line(log, &format!("ERROR: {}", e))?;
                return Ok(RunOutcome {
                    exit_code: 1,
                    skipped: false,
                });
            }
        }
    } else {
        runlog::append_line(
            log,
            &format!(
                "WARNING: env file {} is missing, continuing without it",
                env_path.display()
            ),
        )?;
        indexmap::IndexMap::new()
    };

    let state_dir = dir.join("state");

    let _guard = match lockfile::acquire(&dir.join("run.lock"))? {
        Some(guard) => guard,
        None => {
            runlog::append_line(log, "previous run still active, skipping")?;
            let _ = runlog::append_event(
                &state_dir,
                Event::RunSkipped {
                    reason: "lock held".to_string(),
                },
            );
            return Ok(RunOutcome {
                exit_code: 0,
                skipped: true,
            });
        }
    };

    let run_id = runlog::generate_run_id();
    let start = Instant::now();
    let _ = runlog::append_event(
        &state_dir,
        Event::RunStarted {
            run_id: run_id.clone(),
        },
    );

    // Child stdout and stderr both append to the run log
    let log_out = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .map_err(|e| format!("cannot open log {}: {}", log.display(), e))?;
    let log_err = log_out
        .try_clone()
        .map_err(|e| format!("cannot clone log handle: {}", e))?;

    let status = Command::new(venv::python_bin(app))
        .arg(&app.entry)
        .current_dir(dir)
        .envs(&vars)
        .stdout(Stdio::from(log_out))
        .stderr(Stdio::from(log_err))
        .status()
        .map_err(|e| format!("failed to launch {}: {}", app.entry, e))?;

    let exit_code = status.code().unwrap_or(-1);
    let duration = start.elapsed().as_secs_f64();

    if exit_code == 0 {
        runlog::append_line(log, "run completed successfully")?;
    } else {
        runlog::append_line(log, &format!("run FAILED with exit code {}", exit_code))?;
    }
    let _ = runlog::append_event(
        &state_dir,
        Event::RunCompleted {
            run_id,
            exit_code,
            duration_seconds: duration,
        },
    );

    Ok(RunOutcome {
        exit_code,
        skipped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Build a config rooted in a temp directory.
    fn test_config(root: &Path) -> LanzarConfig {
        let yaml = format!(
            r#"
version: "1.0"
name: test-bot
vm:
  project: p
  zone: z
  instance: test-bot-vm
app:
  dir: {}
log_path: {}
"#,
            root.join("app").display(),
            root.join("bot.log").display()
        );
        serde_yaml_ng::from_str(&yaml).unwrap()
    }

    /// Create the app dir plus a stub venv whose `python` is a bash script.
    fn install_stub(config: &LanzarConfig, body: &str) -> PathBuf {
        let app_dir = PathBuf::from(&config.app.dir);
        let bin = app_dir.join(&config.app.venv).join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let python = bin.join("python");
        std::fs::write(&python, format!("#!/bin/bash\n{}\n", body)).unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();
        python
    }

    fn log_content(config: &LanzarConfig) -> String {
        std::fs::read_to_string(&config.log_path).unwrap()
    }

    #[test]
    fn test_missing_app_dir_exits_one_with_single_log_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let outcome = run(&config).unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(!outcome.skipped);

        let content = log_content(&config);
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 1, "exactly one error line expected");
        assert!(lines[0].contains(&config.app.dir));
        assert!(lines[0].contains("ERROR"));
    }

    #[test]
    fn test_missing_venv_exits_one_without_invoking() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::create_dir_all(&config.app.dir).unwrap();

        let outcome = run(&config).unwrap();
        assert_eq!(outcome.exit_code, 1);

        let content = log_content(&config);
        assert!(content.contains("virtual environment"));
        assert!(!content.contains("run completed"));
        assert!(!content.contains("run FAILED"));
    }

    #[test]
    fn test_env_file_injection() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        // Fail if the comment line leaked; otherwise report FOO
        install_stub(
            &config,
            "test -z \"${baz:-}\" || exit 9\necho \"FOO=${FOO:-unset}\"",
        );
        std::fs::write(
            PathBuf::from(&config.app.dir).join(".env"),
            "FOO=bar\n# baz=qux\n",
        )
        .unwrap();

        let outcome = run(&config).unwrap();
        assert_eq!(outcome.exit_code, 0);

        let content = log_content(&config);
        assert!(content.contains("FOO=bar"), "log: {}", content);
        assert!(content.contains("run completed successfully"));
    }

    #[test]
    fn test_missing_env_file_warns_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "exit 0");

        let outcome = run(&config).unwrap();
        assert_eq!(outcome.exit_code, 0);

        let content = log_content(&config);
        assert!(content.contains("WARNING"));
        assert!(content.contains("run completed successfully"));
    }

    #[test]
    fn test_child_exit_code_propagated_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "exit 3");

        let outcome = run(&config).unwrap();
        assert_eq!(outcome.exit_code, 3);

        let content = log_content(&config);
        let marker = content
            .lines()
            .find(|l| l.contains("run FAILED"))
            .expect("failure marker");
        assert!(marker.contains('3'));
        assert!(marker.starts_with("[20"), "marker must be dated: {}", marker);
    }

    #[test]
    fn test_child_output_appended_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "echo 'posting to mastodon'\necho 'oops' >&2");

        run(&config).unwrap();

        let content = log_content(&config);
        assert!(content.contains("posting to mastodon"));
        assert!(content.contains("oops"));
    }

    #[test]
    fn test_malformed_env_file_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "exit 0");
        std::fs::write(
            PathBuf::from(&config.app.dir).join(".env"),
            "this is not an assignment\n",
        )
        .unwrap();

        let outcome = run(&config).unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(log_content(&config).contains("ERROR"));
    }

    #[test]
    fn test_overlapping_run_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "exit 0");

        // Simulate a live prior run holding the lock
        std::fs::write(
            PathBuf::from(&config.app.dir).join("run.lock"),
            std::process::id().to_string(),
        )
        .unwrap();

        let outcome = run(&config).unwrap();
        assert!(outcome.skipped);
        assert_eq!(outcome.exit_code, 0);
        assert!(log_content(&config).contains("skipping"));
    }

    #[test]
    fn test_lock_released_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "exit 0");

        run(&config).unwrap();
        assert!(!PathBuf::from(&config.app.dir).join("run.lock").exists());

        // A second run proceeds normally
        let outcome = run(&config).unwrap();
        assert!(!outcome.skipped);
    }

    #[test]
    fn test_events_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        install_stub(&config, "exit 3");

        run(&config).unwrap();

        let events = std::fs::read_to_string(
            PathBuf::from(&config.app.dir).join("state").join("events.jsonl"),
        )
        .unwrap();
        assert!(events.contains("run_started"));
        assert!(events.contains("run_completed"));
        assert!(events.contains("\"exit_code\":3"));
    }
}
