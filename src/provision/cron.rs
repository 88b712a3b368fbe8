//! Idempotent cron registration for the scheduled runner.
//!
//! The entry's identity is the runner command: every existing crontab
//! line referencing it is removed before the single new entry is
//! inserted, so repeated registration never duplicates.

use crate::core::types::LanzarConfig;
use crate::exec;
use std::io::Write;

/// The command the scheduler invokes.
pub fn runner_command(config: &LanzarConfig) -> String {
    format!(
        "{} run --file {}/lanzar.yaml",
        config.app.runner_bin, config.app.dir
    )
}

/// The full crontab entry, runner output appended to the run log.
pub fn cron_entry(config: &LanzarConfig) -> String {
    format!(
        "{} {} >> {} 2>&1",
        config.schedule,
        runner_command(config),
        config.log_path
    )
}

/// Merge an entry into existing crontab text, dropping every line that
/// references the command first.
pub fn merge_crontab(existing: &str, entry: &str, command: &str) -> String {
    let mut lines: Vec<&str> = existing.lines().filter(|l| !l.contains(command)).collect();
    lines.push(entry);
    let mut merged = lines.join("\n");
    merged.push('\n');
    merged
}

/// Shell snippet performing the same idempotent replacement, for the
/// first-boot payload where only a shell is available.
pub fn registration_snippet(config: &LanzarConfig) -> String {
    format!(
        "( crontab -l 2>/dev/null | grep -vF '{command}' || true; echo '{entry}' ) | crontab -",
        command = runner_command(config),
        entry = cron_entry(config)
    )
}

/// Register the entry in the local crontab: read, merge, write back.
pub fn install_local(config: &LanzarConfig) -> Result<(), String> {
    // A missing crontab makes `crontab -l` fail; treat as empty
    let current = match exec::run_command("crontab", &["-l"]) {
        Ok(out) if out.success() => out.stdout,
        _ => String::new(),
    };

    let merged = merge_crontab(&current, &cron_entry(config), &runner_command(config));

    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| format!("cannot create crontab temp file: {}", e))?;
    tmp.write_all(merged.as_bytes())
        .map_err(|e| format!("cannot write crontab temp file: {}", e))?;

    let path = tmp.path().to_string_lossy().to_string();
    let out = exec::run_command("crontab", &[&path])?;
    if !out.success() {
        return Err(format!(
            "crontab install failed (exit {}): {}",
            out.exit_code,
            out.stderr.trim()
        ));
    }
    Ok(())
}
