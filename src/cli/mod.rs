//! Command-line interface: argument definitions and dispatch.

use crate::core::types::{LanzarConfig, TimestampedEvent};
use crate::core::{parser, runner, venv};
use crate::provision::{bootstrap, driver};
use crate::runlog;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "lanzar",
    version,
    about = "Deployment automation for a scheduled bot VM",
    long_about = "Provision a cloud VM, bootstrap it at first boot, register a cron \
                  schedule, and run the application with env-file injection and \
                  append-only logging."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a new lanzar.yaml in a directory
    Init {
        /// Target directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Parse and validate a configuration
    Validate {
        /// Configuration file
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,
    },

    /// Print the venv activation snippet, for `eval "$(lanzar activate)"`
    Activate {
        /// Configuration file
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,
    },

    /// Print the first-boot payload, or apply it to the local host
    Bootstrap {
        /// Configuration file
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,

        /// Apply the steps locally instead of printing the payload
        #[arg(long)]
        execute: bool,
    },

    /// Provision the VM: delete any existing instance, then create it
    Deploy {
        /// Configuration file
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,

        /// Event journal directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Print the create command without executing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Execute one scheduled run of the application
    Run {
        /// Configuration file
        #[arg(short, long, default_value = "lanzar.yaml")]
        file: PathBuf,
    },

    /// Show recent events from the journal
    Status {
        /// Event journal directory
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Number of events to show
        #[arg(long, default_value = "10")]
        tail: usize,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Dispatch a parsed command, returning the process exit code.
pub fn dispatch(command: Commands) -> Result<i32, String> {
    match command {
        Commands::Init { path } => {
            cmd_init(&path)?;
            Ok(0)
        }
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Activate { file } => {
            let config = load_valid_config(&file)?;
            print!("{}", venv::activation_script(&config.app));
            Ok(0)
        }
        Commands::Bootstrap { file, execute } => {
            let config = load_valid_config(&file)?;
            if execute {
                bootstrap::apply_local(&config)?;
            } else {
                print!("{}", bootstrap::startup_script(&config));
            }
            Ok(0)
        }
        Commands::Deploy {
            file,
            state_dir,
            dry_run,
        } => {
            let config = load_valid_config(&file)?;
            driver::deploy(&driver::DeployOptions {
                config: &config,
                state_dir: &state_dir,
                dry_run,
            })?;
            Ok(0)
        }
        Commands::Run { file } => {
            let config = load_valid_config(&file)?;
            let outcome = runner::run(&config)?;
            Ok(outcome.exit_code)
        }
        Commands::Status { state_dir, tail } => {
            cmd_status(&state_dir, tail)?;
            Ok(0)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lanzar", &mut std::io::stdout());
            Ok(0)
        }
    }
}

/// Parse a config file and reject it if validation finds errors.
fn load_valid_config(path: &Path) -> Result<LanzarConfig, String> {
    let config = parser::parse_config_file(path)?;
    let errors = parser::validate_config(&config);
    if !errors.is_empty() {
        let list: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
        return Err(format!(
            "{} is invalid:\n{}",
            path.display(),
            list.join("\n")
        ));
    }
    Ok(config)
}

const CONFIG_TEMPLATE: &str = r#"version: "1.0"
name: flower-bot
description: Scheduled bot posting a daily flower

vm:
  project: my-project
  zone: us-central1-a
  instance: flower-bot-vm
  # machine_type: e2-small
  # image_family: debian-12
  # boot_disk_size: 10GB

app:
  dir: /opt/flower-bot
  # entry: main.py
  # venv: venv
  # env_file: .env        # expects keys such as OPENROUTER_API_KEY,
  #                       # NOTION_API_KEY, NOTION_PAGE_IDS,
  #                       # MASTODON_BASE_URL, MASTODON_ACCESS_TOKEN,
  #                       # TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID,
  #                       # REPLICATE_API_TOKEN
  # requirements: requirements.txt

log_path: /var/log/flower-bot.log
schedule: "0 9 * * *"
"#;

fn cmd_init(dir: &Path) -> Result<(), String> {
    let path = dir.join("lanzar.yaml");
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    std::fs::write(&path, CONFIG_TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
    std::fs::create_dir_all(dir.join("state"))
        .map_err(|e| format!("cannot create state dir: {}", e))?;

    println!("Created {}", path.display());
    println!("Edit it, then: lanzar validate && lanzar deploy");
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<i32, String> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        println!(
            "OK: {} ({} in {})",
            config.name, config.vm.instance, config.vm.zone
        );
        Ok(0)
    } else {
        eprintln!("{} error(s) in {}:", errors.len(), file.display());
        for e in &errors {
            eprintln!("  - {}", e);
        }
        Ok(1)
    }
}

fn cmd_status(state_dir: &Path, tail: usize) -> Result<(), String> {
    let path = runlog::event_log_path(state_dir);
    if !path.exists() {
        println!("No events recorded in {}", state_dir.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(tail);

    for line in &lines[start..] {
        match serde_json::from_str::<TimestampedEvent>(line) {
            Ok(te) => println!("{}  {:?}", te.ts, te.event),
            Err(_) => println!("(unparsable) {}", line),
        }
    }
    Ok(())
}
