//! stagehand CLI
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use stagehand::{Cli, Commands, commands};
use stagehand_core::config::{Config, ConfigLoader};

mod observability;

use observability::Verbosity;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    let cwd = checkout_dir(cli.chdir.as_deref())?;
    let config = load_config(&cwd, cli.config.clone())?;

    let _log = observability::init(
        Verbosity::new(cli.quiet, cli.verbose),
        config.log_level.as_str(),
        config.log_dir.as_ref().map(|dir| dir.as_std_path()),
    );
    tracing::debug!(%cwd, verbose = cli.verbose, json = cli.json, "starting");

    let json = cli.json;
    let result = match cli.command {
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, json, &config, &cwd),
        Commands::Info(args) => commands::info::cmd_info(args, json, &config, &cwd),
        Commands::Version(args) => commands::version::cmd_version(args, json, &config, &cwd),
        Commands::Modules(args) => commands::modules::cmd_modules(args, json, &config, &cwd),
        Commands::Release(args) => commands::release::cmd_release(args, json, &config, &cwd),
        Commands::Staging(args) => commands::staging::cmd_staging(args, json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

/// Apply `-C` and return the directory the run works in.
fn checkout_dir(chdir: Option<&Path>) -> anyhow::Result<Utf8PathBuf> {
    if let Some(dir) = chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    utf8(cwd, "current directory")
}

/// Merge user, project and `--config` files plus `STAGEHAND_*` overrides.
fn load_config(cwd: &Utf8Path, explicit: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new().with_project_search(cwd);
    if let Some(path) = explicit {
        loader = loader.with_file(&utf8(path, "config path")?);
    }
    loader.load().context("failed to load configuration")
}

fn utf8(path: PathBuf, what: &str) -> anyhow::Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(path)
        .map_err(|e| anyhow!("{what} is not valid UTF-8: {}", e.into_path_buf().display()))
}
