//! VM deployment driver — idempotent delete-then-create provisioning.
//!
//! Deletion completion is confirmed by polling `describe` with bounded
//! exponential backoff rather than a fixed sleep. Any provisioning
//! command failure aborts the whole deploy; there is no rollback.

use super::bootstrap;
use crate::core::types::{Event, LanzarConfig, VmSpec};
use crate::exec::{self, ExecOutput};
use crate::runlog;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Options for one deploy invocation.
pub struct DeployOptions<'a> {
    pub config: &'a LanzarConfig,
    pub state_dir: &'a Path,
    pub dry_run: bool,
}

/// Provision the instance described by the config.
pub fn deploy(opts: &DeployOptions) -> Result<(), String> {
    let vm = &opts.config.vm;

    if opts.dry_run {
        let args = create_args(vm, "startup-script=<generated payload>");
        println!("Would run: {} {}", vm.gcloud, args.join(" "));
        return Ok(());
    }

    let start = Instant::now();
    let run_id = runlog::generate_run_id();
    let _ = runlog::append_event(
        opts.state_dir,
        Event::DeployStarted {
            instance: vm.instance.clone(),
            run_id: run_id.clone(),
            lanzar_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );

    gcloud(vm, &["config", "set", "project", &vm.project])?;

    if instance_exists(vm)? {
        println!("Instance {} already exists, deleting...", vm.instance);
        let delete_start = Instant::now();
        gcloud(
            vm,
            &[
                "compute",
                "instances",
                "delete",
                &vm.instance,
                "--zone",
                &vm.zone,
                "--quiet",
            ],
        )?;
        wait_for_deletion(vm)?;
        let _ = runlog::append_event(
            opts.state_dir,
            Event::InstanceDeleted {
                instance: vm.instance.clone(),
                wait_seconds: delete_start.elapsed().as_secs_f64(),
            },
        );
    }

    // The payload file must outlive the create call
    let mut payload = tempfile::NamedTempFile::new()
        .map_err(|e| format!("cannot create payload temp file: {}", e))?;
    payload
        .write_all(bootstrap::startup_script(opts.config).as_bytes())
        .map_err(|e| format!("cannot write payload: {}", e))?;

    let metadata = format!("startup-script={}", payload.path().display());
    let args = create_args(vm, &metadata);
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    gcloud(vm, &arg_refs)?;

    let _ = runlog::append_event(
        opts.state_dir,
        Event::InstanceCreated {
            instance: vm.instance.clone(),
            zone: vm.zone.clone(),
            machine_type: vm.machine_type.clone(),
        },
    );
    let _ = runlog::append_event(
        opts.state_dir,
        Event::DeployCompleted {
            instance: vm.instance.clone(),
            run_id,
            total_seconds: start.elapsed().as_secs_f64(),
        },
    );

    print_next_steps(opts.config);
    Ok(())
}

/// Run a provisioning command, failing on non-zero exit.
fn gcloud(vm: &VmSpec, args: &[&str]) -> Result<ExecOutput, String> {
    let out = exec::run_command(&vm.gcloud, args)?;
    if !out.success() {
        return Err(format!(
            "{} {} failed (exit {}): {}",
            vm.gcloud,
            args.join(" "),
            out.exit_code,
            out.stderr.trim()
        ));
    }
    Ok(out)
}

/// Does the instance currently exist? `describe` exits non-zero when not.
fn instance_exists(vm: &VmSpec) -> Result<bool, String> {
    let out = exec::run_command(
        &vm.gcloud,
        &[
            "compute",
            "instances",
            "describe",
            &vm.instance,
            "--zone",
            &vm.zone,
            "--format",
            "value(name)",
        ],
    )?;
    Ok(out.success())
}

/// Poll until the deletion has completed, doubling the delay each attempt.
fn wait_for_deletion(vm: &VmSpec) -> Result<(), String> {
    let poll = &vm.deletion_poll;
    let mut delay = Duration::from_millis(poll.initial_delay_ms);

    for attempt in 1..=poll.max_attempts {
        std::thread::sleep(delay);
        if !instance_exists(vm)? {
            return Ok(());
        }
        eprintln!(
            "instance {} still present (attempt {}/{})",
            vm.instance, attempt, poll.max_attempts
        );
        delay = delay.saturating_mul(2);
    }

    Err(format!(
        "instance {} still present after {} poll attempts",
        vm.instance, poll.max_attempts
    ))
}

fn create_args(vm: &VmSpec, metadata: &str) -> Vec<String> {
    [
        "compute",
        "instances",
        "create",
        vm.instance.as_str(),
        "--zone",
        vm.zone.as_str(),
        "--machine-type",
        vm.machine_type.as_str(),
        "--image-family",
        vm.image_family.as_str(),
        "--image-project",
        vm.image_project.as_str(),
        "--boot-disk-size",
        vm.boot_disk_size.as_str(),
        "--boot-disk-type",
        vm.boot_disk_type.as_str(),
        "--scopes",
        vm.scopes.as_str(),
        "--metadata-from-file",
        metadata,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn print_next_steps(config: &LanzarConfig) {
    let vm = &config.vm;
    let app = &config.app;
    println!(
        "Instance {} created in {} (bootstrap runs at first boot).",
        vm.instance, vm.zone
    );
    println!();
    println!("Next steps:");
    println!("  1. Upload the runner binary:");
    println!(
        "       gcloud compute scp target/release/lanzar {}:{} --zone {}",
        vm.instance, app.runner_bin, vm.zone
    );
    println!("  2. Upload the application, manifest, and config:");
    println!(
        "       gcloud compute scp {} {} lanzar.yaml {}:{}/ --zone {}",
        app.entry, app.requirements, vm.instance, app.dir, vm.zone
    );
    println!(
        "  3. Populate {}/{} with API credentials (mode 0600).",
        app.dir, app.env_file
    );
    println!("  4. Re-run the bootstrap after uploading:");
    println!(
        "       gcloud compute ssh {} --zone {} --command 'sudo google_metadata_script_runner startup'",
        vm.instance, vm.zone
    );
}
