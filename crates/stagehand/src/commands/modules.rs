//! Modules command: resolve module versions and, optionally, rebuild decisions.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use stagehand_core::config::Config;
use stagehand_core::modules::ModuleSet;
use stagehand_core::modules::resolve::resolve_modules;
use stagehand_core::rebuild::{ModuleReport, Phase, RebuildEngine, RebuildOptions};
use stagehand_core::release::select_release_version;
use stagehand_core::{RunSettings, Toolchain};

use super::{ModuleArgs, VersionArgs};

/// Arguments for the `modules` subcommand.
#[derive(Args, Debug, Default)]
pub struct ModulesArgs {
    #[command(flatten)]
    pub modules: ModuleArgs,

    #[command(flatten)]
    pub version: VersionArgs,

    /// Also decide which modules the internal phase would rebuild
    #[arg(long)]
    pub check: bool,

    /// Treat every module as needing a rebuild (with --check)
    #[arg(long, requires = "check")]
    pub force_rebuild: bool,
}

#[derive(Serialize)]
struct ModulesReport<'a> {
    modules: &'a ModuleSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    decisions: Option<Vec<ModuleReport>>,
}

/// Resolve and print modules.
#[instrument(name = "cmd_modules", skip_all, fields(json_output))]
pub fn cmd_modules(
    args: ModulesArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, check = args.check, "executing modules command");

    let mut config = config.clone();
    args.modules.apply(&mut config);
    args.version.apply(&mut config);
    let settings = RunSettings::from_config(&config, cwd);
    let toolchain = Toolchain::from_settings(&settings);
    let services = toolchain.services();

    let manifest = settings
        .load_manifest()
        .with_context(|| format!("failed to read {}", settings.manifest))?;
    let modules = resolve_modules(&settings.module_request(), &manifest, services.scm)
        .context("module resolution failed")?;

    let decisions = if args.check {
        let decision = select_release_version(
            &settings.version_request,
            &settings.root,
            services.scm,
            services.build,
        )
        .context("version selection failed")?;
        let options = RebuildOptions {
            force_rebuild: args.force_rebuild || settings.force_rebuild,
            clean: settings.clean,
            work_dir: settings.work_dir.clone(),
            integration_repo: settings.integration_repo.clone().unwrap_or_default(),
        };
        let engine = RebuildEngine::new(
            services.scm,
            services.build,
            services.artifacts,
            &decision,
            &options,
        );
        Some(engine.plan(Phase::Internal, &modules))
    } else {
        None
    };

    if global_json {
        let report = ModulesReport {
            modules: &modules,
            decisions,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Modules".bold().underline());
    for spec in &modules {
        let decision = decisions
            .as_ref()
            .and_then(|d| d.iter().find(|r| r.id == spec.id()));
        let verdict = match decision {
            Some(r) if r.reason.builds() => format!("build: {}", r.reason).yellow().to_string(),
            Some(r) => r.reason.to_string().green().to_string(),
            None => String::new(),
        };
        println!(
            "  {:<20} {:<28} {} {}",
            spec.id().to_string().bold(),
            spec.version().as_str().cyan(),
            format!("@ {}", spec.revision()).dimmed(),
            verdict,
        );
    }

    Ok(())
}
