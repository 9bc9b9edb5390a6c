//! Doctor command: diagnose configuration, environment, and external tools.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use stagehand_core::config::{self, Config};
use stagehand_core::settings::DEFAULT_BUILD_COMMAND;
use stagehand_core::tools::{self, ToolStatus};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    environment: EnvironmentInfo,
    tools: Vec<ToolStatus>,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to loaded config file, if any
    file: Option<String>,
    /// Whether a config file was found
    found: bool,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Current working directory
    cwd: Option<String>,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

const ENV_VARS: &[(&str, &str)] = &[
    ("XDG_CONFIG_HOME", "Override config directory"),
    ("XDG_CACHE_HOME", "Override cache directory"),
    ("XDG_DATA_HOME", "Override data directory"),
    ("RUST_LOG", "Log filter directive"),
    ("STAGEHAND_LOG_PATH", "Explicit log file path"),
    ("STAGEHAND_LOG_DIR", "Log directory"),
];

impl DoctorReport {
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);
        let build_command = config
            .build
            .as_ref()
            .and_then(|b| b.command.as_deref())
            .unwrap_or(DEFAULT_BUILD_COMMAND);

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            environment: EnvironmentInfo {
                cwd: Some(cwd.to_string()),
                env_vars: ENV_VARS
                    .iter()
                    .map(|&(name, description)| EnvVar {
                        name,
                        value: std::env::var(name).ok(),
                        description,
                    })
                    .collect(),
            },
            tools: tools::check_tools(build_command),
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration (for the build tool name)
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(config, cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // Config status
    println!("{}", "Configuration".bold().underline());
    if report.config.found {
        println!(
            "  {} Config file: {}",
            "✓".green(),
            report.config.file.as_deref().unwrap_or("").cyan()
        );
    } else {
        println!("  {} No config file found", "○".yellow());
        offer_config_creation()?;
    }
    println!();

    // Tools
    println!("{}", "Tools".bold().underline());
    for tool in &report.tools {
        match (&tool.path, &tool.version) {
            (Some(path), Some(version)) => {
                println!("  {} {}: {} {}", "✓".green(), tool.name.bold(), path.cyan(), version.dimmed());
            }
            (Some(path), None) => println!("  {} {}: {}", "✓".green(), tool.name.bold(), path.cyan()),
            (None, _) => println!("  {} {}: {}", "✗".red(), tool.name.bold(), "not found on PATH".yellow()),
        }
    }
    println!();

    // Directories
    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    // Environment
    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());

    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();

    if set_vars.is_empty() {
        println!("  {} No XDG/logging overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {} {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan(),
                format!("({})", var.description).dimmed()
            );
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a default config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };

    let config_path = config_dir.join("config.yaml");

    // Don't prompt if running non-interactively
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted: nothing to do.
    if let Ok(true) = create {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_saphyr::to_string(&Config::default())?;
        std::fs::write(&config_path, yaml)?;

        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
