//! Version command: decide the release version of the checkout.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use stagehand_core::config::Config;
use stagehand_core::output::write_run_output;
use stagehand_core::release::select_release_version;
use stagehand_core::{RunSettings, Toolchain};

use super::VersionArgs;

/// Arguments for the `version` subcommand.
#[derive(Args, Debug, Default)]
pub struct VersionCmdArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    /// Also write the run output file (version and dist override)
    #[arg(long)]
    pub write_output: bool,
}

/// Select and print the release version.
#[instrument(name = "cmd_version", skip_all, fields(json_output))]
pub fn cmd_version(
    args: VersionCmdArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing version command");

    let mut config = config.clone();
    args.version.apply(&mut config);
    let settings = RunSettings::from_config(&config, cwd);
    let toolchain = Toolchain::from_settings(&settings);
    let services = toolchain.services();

    let decision = select_release_version(
        &settings.version_request,
        &settings.root,
        services.scm,
        services.build,
    )
    .context("version selection failed")?;

    if args.write_output {
        write_run_output(&settings.output_file, &decision, services.build)
            .with_context(|| format!("failed to write {}", settings.output_file))?;
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        "Version".bold(),
        decision.version().to_string().green().bold()
    );
    println!("{}: {}", "Binary version".dimmed(), decision.binary_version());
    println!("{}: {}", "Source".dimmed(), decision.source());
    println!(
        "{}: {}",
        "Public staging".dimmed(),
        if decision.publish_to_sonatype() {
            "yes".green().to_string()
        } else {
            "no".yellow().to_string()
        }
    );
    println!(
        "{}: {}",
        "Scaladoc revision".dimmed(),
        decision.scaladoc_revision().as_str().cyan()
    );
    if args.write_output {
        println!("  {} Wrote {}", "✓".green(), settings.output_file.cyan());
    }

    Ok(())
}
