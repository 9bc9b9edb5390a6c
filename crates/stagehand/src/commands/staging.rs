//! Staging command: operator access to public staging repositories.

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use stagehand_core::config::Config;
use stagehand_core::staging::StagingApi;
use stagehand_core::{RunSettings, Toolchain};

/// Arguments for the `staging` subcommand.
#[derive(Args, Debug)]
pub struct StagingArgs {
    #[command(subcommand)]
    pub action: StagingAction,
}

/// Staging operations.
#[derive(Subcommand, Debug)]
pub enum StagingAction {
    /// List open staging repositories
    List,

    /// Close staging repositories
    Close(SelectArgs),

    /// Drop staging repositories
    Drop(SelectArgs),
}

/// Which repositories to act on.
#[derive(Args, Debug, Default)]
pub struct SelectArgs {
    /// Repository ids
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub ids: Vec<String>,

    /// Act on every open repository of the profile
    #[arg(long)]
    pub all: bool,

    /// Description recorded with the action
    #[arg(long, short, default_value = "stagehand")]
    pub message: String,
}

/// Execute a staging action.
#[instrument(name = "cmd_staging", skip_all)]
pub fn cmd_staging(
    args: StagingArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    let settings = RunSettings::from_config(config, cwd);
    let toolchain = Toolchain::from_settings(&settings);
    let staging = toolchain.staging();
    let profile = settings.staging_profile.as_str();
    debug!(json_output = global_json, profile, url = %settings.staging_url, "executing staging command");

    match args.action {
        StagingAction::List => {
            let open = staging
                .list_open(profile)
                .context("failed to list staging repositories")?;
            if global_json {
                println!("{}", serde_json::to_string_pretty(&open)?);
            } else if open.is_empty() {
                println!("  {} No open repositories for {}", "○".dimmed(), profile.cyan());
            } else {
                println!("{}", "Open staging repositories".bold().underline());
                for repo in &open {
                    println!("  {} {}", repo.id.bold(), repo.uri.dimmed());
                }
            }
        }
        StagingAction::Close(select) => {
            let ids = selected(staging, profile, select.ids, select.all)?;
            staging
                .close(&ids, &select.message)
                .context("failed to close staging repositories")?;
            report("Closed", &ids, global_json)?;
        }
        StagingAction::Drop(select) => {
            let ids = selected(staging, profile, select.ids, select.all)?;
            staging
                .drop_repos(&ids, &select.message)
                .context("failed to drop staging repositories")?;
            report("Dropped", &ids, global_json)?;
        }
    }

    Ok(())
}

fn selected(
    staging: &dyn StagingApi,
    profile: &str,
    ids: Vec<String>,
    all: bool,
) -> anyhow::Result<Vec<String>> {
    if !all {
        return Ok(ids);
    }
    let open = staging
        .list_open(profile)
        .context("failed to list staging repositories")?;
    if open.is_empty() {
        bail!("no open staging repositories for {profile}");
    }
    Ok(open.into_iter().map(|r| r.id).collect())
}

fn report(action: &str, ids: &[String], global_json: bool) -> anyhow::Result<()> {
    if global_json {
        let json = serde_json::json!({ "action": action.to_lowercase(), "ids": ids });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for id in ids {
            println!("  {} {action} {}", "✓".green(), id.cyan());
        }
    }
    Ok(())
}
