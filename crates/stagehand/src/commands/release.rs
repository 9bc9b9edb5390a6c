//! Release command: thin CLI layer over `stagehand_core::run`.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use stagehand_core::config::{Config, ReleaseConfig};
use stagehand_core::run::{self, PhaseOutcome, ReadyRun, RunEvent, RunOptions};
use stagehand_core::{RunSettings, Toolchain};

use super::{ModuleArgs, VersionArgs};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    #[command(flatten)]
    pub version: VersionArgs,

    #[command(flatten)]
    pub modules: ModuleArgs,

    /// Rebuild every module even when already published
    #[arg(long)]
    pub force_rebuild: bool,

    /// Run the stability test after the quick build
    #[arg(long)]
    pub test_stability: bool,

    /// Decide versions and rebuilds without building or publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl ReleaseArgs {
    fn apply(&self, config: &mut Config) {
        self.version.apply(config);
        self.modules.apply(config);
        let release = config.release.get_or_insert_with(ReleaseConfig::default);
        if self.force_rebuild {
            release.force_rebuild = Some(true);
        }
        if self.test_stability {
            release.test_stability = Some(true);
        }
    }
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all)]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing release command"
    );

    let mut config = config.clone();
    args.apply(&mut config);
    let settings = RunSettings::from_config(&config, cwd);
    let toolchain = Toolchain::from_settings(&settings);
    let services = toolchain.services();

    let is_dry = args.dry_run;
    let options = RunOptions { dry_run: is_dry };

    // Plan: version selection + module resolution
    let ready = run::plan_run(&settings, &services, options).context("release planning failed")?;

    if !global_json {
        if is_dry {
            println!("\n{}", "DRY RUN: nothing will be built or published".yellow().bold());
        }
        print_plan(&ready);
    }

    // Confirm before executing (unless dry-run, --yes, or config says no)
    if !is_dry && !global_json && settings.confirm && !args.yes {
        let confirmed = Confirm::new("Proceed with release?")
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let mut spinner: Option<ProgressBar> = None;
    let outcome = ready
        .execute(&services, |event| {
            if !global_json {
                handle_event(event, is_dry, &mut spinner);
            }
        })
        .context("release failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        let built = outcome.internal.iter().filter(|r| r.reason.builds()).count();
        if is_dry {
            println!(
                "{} Dry run complete: {} phases previewed, {built} modules would build",
                "✓".green(),
                outcome.phases.len(),
            );
        } else {
            println!(
                "{} Released {} ({} phases, {built} modules built)",
                "✓".green().bold(),
                outcome.decision.version().to_string().green().bold(),
                outcome.phases.len(),
            );
        }
    }

    Ok(())
}

/// Print the settled version and modules before confirmation.
fn print_plan(ready: &ReadyRun) {
    let decision = &ready.decision;
    println!(
        "\n{}: {} ({} {})",
        "Release".bold(),
        decision.version().to_string().green().bold(),
        "binary".dimmed(),
        decision.binary_version(),
    );
    println!(
        "{}: {} | {}: {}",
        "Source".dimmed(),
        decision.source(),
        "Public staging".dimmed(),
        if decision.publish_to_sonatype() { "yes" } else { "no" },
    );
    let modules: Vec<String> = ready
        .modules
        .iter()
        .map(|m| format!("{} {}", m.id(), m.version()))
        .collect();
    println!("{}: {}", "Modules".dimmed(), modules.join(", "));
    println!();
}

/// Handle a run event for terminal progress display.
fn handle_event(event: RunEvent, is_dry: bool, spinner: &mut Option<ProgressBar>) {
    match event {
        RunEvent::PhaseStarted(phase) => {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
            }
            bar.set_message(format!("{phase}..."));
            bar.enable_steady_tick(std::time::Duration::from_millis(80));
            *spinner = Some(bar);
        }
        RunEvent::PhaseCompleted(phase, outcome) => {
            if let Some(bar) = spinner.take() {
                bar.finish_and_clear();
            }
            match outcome {
                PhaseOutcome::Success { message } => {
                    let prefix = if is_dry { "○" } else { "✓" };
                    println!(
                        "  {} {} {}",
                        prefix.green(),
                        format!("{phase}").bold(),
                        message.dimmed(),
                    );
                }
                PhaseOutcome::Skipped { reason } => {
                    println!(
                        "  {} {} {}",
                        "–".yellow(),
                        format!("{phase}").bold(),
                        format!("skipped: {reason}").dimmed(),
                    );
                }
            }
        }
        RunEvent::ModuleDecided { phase, report } => {
            let line = format!(
                "    {} {} {} ({})",
                if report.reason.builds() { "→" } else { "·" },
                report.id,
                report.version,
                report.reason,
            );
            let line = format!("{line} [{phase}]");
            match spinner {
                Some(bar) => bar.println(line.dimmed().to_string()),
                None => println!("{}", line.dimmed()),
            }
        }
    }
}
