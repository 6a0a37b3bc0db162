mod http;
mod render;

use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scriptup_core::{ScriptLocation, ScriptVersion, UpdateError, UpdateSettings};
use scriptup_updater::{rollback, UpdateExecutor, UpdateOutcome, UpdateRequest};
use tracing_subscriber::EnvFilter;

use http::HttpReleaseSource;
use render::{print_status, StatusLevel};

#[derive(Parser, Debug)]
#[command(name = "scriptup")]
#[command(about = "Self-update and rollback for a managed standalone script", long_about = None)]
struct Cli {
    /// Path of the managed script file.
    #[arg(long)]
    script_path: PathBuf,

    /// TOML settings file; command-line flags override its values.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    channel: Option<String>,

    #[arg(long)]
    metadata_url: Option<String>,

    #[arg(long)]
    release_root: Option<String>,

    /// Hours between remote checks; 0 disables throttling.
    #[arg(long)]
    check_interval: Option<u64>,

    /// Hex-encoded trusted root key, repeatable.
    #[arg(long = "trusted-root")]
    trusted_roots: Vec<String>,

    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a newer version is published. Installs it when the
    /// settings file enables auto-update.
    Check {
        #[arg(long)]
        current_version: String,
        /// Check even inside the throttle window.
        #[arg(long)]
        force: bool,
        /// Skip the remote check entirely.
        #[arg(long)]
        skip: bool,
        /// Also report newer builds on other channels.
        #[arg(long)]
        dev_info: bool,
    },
    /// Check and install a newer version when one exists.
    Update {
        #[arg(long)]
        current_version: String,
        #[arg(long)]
        force: bool,
        /// Relaunch the script after a successful update.
        #[arg(long)]
        restart: bool,
        /// Arguments handed to the script when relaunching it.
        #[arg(last = true)]
        script_args: Vec<String>,
    },
    /// Restore the most recent backup, quarantining the live script.
    Rollback,
}

#[derive(Debug, Default, Clone)]
struct SettingsOverrides {
    channel: Option<String>,
    metadata_url: Option<String>,
    release_root: Option<String>,
    check_interval_hours: Option<u64>,
    trusted_root_keys: Vec<String>,
}

fn apply_overrides(settings: &mut UpdateSettings, overrides: &SettingsOverrides) {
    if let Some(channel) = &overrides.channel {
        settings.channel = channel.clone();
    }
    if let Some(metadata_url) = &overrides.metadata_url {
        settings.metadata_url = metadata_url.clone();
    }
    if let Some(release_root) = &overrides.release_root {
        settings.release_root = release_root.clone();
    }
    if let Some(hours) = overrides.check_interval_hours {
        settings.check_interval_hours = hours;
    }
    if !overrides.trusted_root_keys.is_empty() {
        settings.trusted_root_keys = overrides.trusted_root_keys.clone();
    }
}

fn default_settings() -> UpdateSettings {
    UpdateSettings {
        channel: "stable".to_string(),
        metadata_url: String::new(),
        release_root: String::new(),
        check_interval_hours: 24,
        auto_update: false,
        restart_after_update: false,
        show_dev_info: false,
        trusted_root_keys: Vec::new(),
    }
}

fn load_settings(cli: &Cli) -> Result<UpdateSettings> {
    let mut settings = match &cli.settings {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file: {}", path.display()))?;
            UpdateSettings::from_toml_str(&raw)
                .with_context(|| format!("failed to parse settings file: {}", path.display()))?
        }
        None => default_settings(),
    };

    apply_overrides(
        &mut settings,
        &SettingsOverrides {
            channel: cli.channel.clone(),
            metadata_url: cli.metadata_url.clone(),
            release_root: cli.release_root.clone(),
            check_interval_hours: cli.check_interval,
            trusted_root_keys: cli.trusted_roots.clone(),
        },
    );

    if settings.metadata_url.trim().is_empty() {
        bail!("no metadata URL configured; pass --metadata-url or a settings file");
    }
    if settings.release_root.trim().is_empty() {
        bail!("no release root configured; pass --release-root or a settings file");
    }

    Ok(settings)
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            print_status(StatusLevel::Error, &format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let location = ScriptLocation::new(&cli.script_path)?;

    match &cli.command {
        Commands::Rollback => {
            let outcome = match rollback(&location) {
                Ok(outcome) => outcome,
                Err(err) => return Ok(report_failure(&err)),
            };
            print_status(
                StatusLevel::Success,
                &format!(
                    "restored {} from {}",
                    location.path().display(),
                    outcome.restored_backup.display()
                ),
            );
            if let Some(quarantined) = outcome.quarantined {
                print_status(
                    StatusLevel::Info,
                    &format!("previous file kept at {}", quarantined.display()),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            current_version,
            force,
            skip,
            dev_info,
        } => {
            let request = UpdateRequest {
                running_version: parse_version(current_version)?,
                auto_update: false,
                restart_after_update: false,
                force_check: *force,
                skip_check: *skip,
                show_dev_info: *dev_info,
            };
            run_executor(cli, &location, request, &[])
        }
        Commands::Update {
            current_version,
            force,
            restart,
            script_args,
        } => {
            let request = UpdateRequest {
                running_version: parse_version(current_version)?,
                auto_update: true,
                restart_after_update: *restart,
                force_check: *force,
                skip_check: false,
                show_dev_info: false,
            };
            run_executor(cli, &location, request, script_args)
        }
    }
}

fn parse_version(raw: &str) -> Result<ScriptVersion> {
    raw.parse()
        .map_err(|err| anyhow::anyhow!("invalid --current-version: {err}"))
}

fn run_executor(
    cli: &Cli,
    location: &ScriptLocation,
    request: UpdateRequest,
    script_args: &[String],
) -> Result<ExitCode> {
    let settings = load_settings(cli)?;
    let source = HttpReleaseSource::new(&settings);
    let mut executor = UpdateExecutor::new(location, &settings, &source);

    let outcome = match executor.run(&request) {
        Ok(outcome) => outcome,
        Err(err) => return Ok(report_failure(&err)),
    };

    match outcome {
        UpdateOutcome::CheckSkipped => {
            print_status(StatusLevel::Info, "remote check skipped");
        }
        UpdateOutcome::ThrottleSkipped => {
            print_status(
                StatusLevel::Info,
                "checked recently, skipping; use --force to check anyway",
            );
        }
        UpdateOutcome::MetadataUnavailable => {
            print_status(
                StatusLevel::Warning,
                "version metadata unavailable, continuing with the current version",
            );
        }
        UpdateOutcome::UpToDate { newer_elsewhere } => {
            print_status(StatusLevel::Success, "already up to date");
            if let Some((channel, version)) = newer_elsewhere {
                print_status(
                    StatusLevel::Info,
                    &format!("newer build {version} is published on channel '{channel}'"),
                );
            }
        }
        UpdateOutcome::UpdateAvailable { version, notes } => {
            print_status(
                StatusLevel::Success,
                &format!("update {version} available; run the update command to install"),
            );
            for note in notes {
                print_status(StatusLevel::Info, &format!("  - {note}"));
            }
        }
        UpdateOutcome::Updated {
            previous,
            installed,
            backup_path,
            restart_requested,
        } => {
            print_status(
                StatusLevel::Success,
                &format!(
                    "updated {} from {previous} to {installed}",
                    location.file_name()
                ),
            );
            print_status(
                StatusLevel::Info,
                &format!("previous version backed up at {}", backup_path.display()),
            );
            if restart_requested {
                restart_script(location, script_args);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn report_failure(err: &UpdateError) -> ExitCode {
    print_status(
        StatusLevel::Error,
        &format!("{err} (reason={})", err.reason_code()),
    );
    ExitCode::FAILURE
}

/// Thin outer-shell restart: the core only signals the request; the actual
/// relaunch with the original arguments happens here.
fn restart_script(location: &ScriptLocation, script_args: &[String]) {
    match Command::new(location.path()).args(script_args).spawn() {
        Ok(child) => {
            print_status(
                StatusLevel::Info,
                &format!("relaunched {} (pid {})", location.file_name(), child.id()),
            );
        }
        Err(err) => {
            print_status(
                StatusLevel::Warning,
                &format!("failed to relaunch {}: {err}", location.path().display()),
            );
        }
    }
}
