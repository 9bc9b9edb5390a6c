//! Release run orchestration.
//!
//! Sequences version selection, module resolution, cleanup, the locker
//! build, the internal module phase, the quick build, the optional
//! stability test and the optional public staging phase.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_run`]): select the release version and resolve
//!    every module. Nothing is built and nothing is written, so the CLI
//!    can show the plan and ask for confirmation.
//! 2. **Execute** ([`ReadyRun::execute`]): run the phases in order, with
//!    event callbacks for progress display. The first error aborts the
//!    run; nothing is rolled back.

use std::fmt;
use std::process::Command;

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tracing::span::EnteredSpan;
use tracing::{debug, info, info_span, instrument};

use crate::build::{BootstrapStage, BuildError, BuildInvocation, BuildTask, BuildTool, PublishTarget};
use crate::cleanup::CleanupError;
use crate::modules::resolve::resolve_modules;
use crate::modules::{ModuleError, ModuleSet};
use crate::output::write_run_output;
use crate::properties::PropertiesError;
use crate::rebuild::{ModuleReport, Phase, RebuildEngine, RebuildError, RebuildOptions};
use crate::release::{ReleaseDecision, select_release_version};
use crate::services::Services;
use crate::settings::RunSettings;
use crate::staging::{StagingApi, StagingError};
use crate::version::VersionError;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from a release run.
#[derive(Error, Debug)]
pub enum RunError {
    /// Version selection failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Module resolution failed.
    #[error(transparent)]
    Module(#[from] ModuleError),

    /// Reading the manifest or writing the run output failed.
    #[error(transparent)]
    Properties(#[from] PropertiesError),

    /// A compiler build failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A module build failed.
    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    /// The staging API failed.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Existing-build cleanup failed.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    /// Builds need somewhere to publish.
    #[error("no integration repository configured (set repositories.integration)")]
    MissingIntegrationRepo,

    /// A phase failed outside the build tool.
    #[error("{phase} phase failed: {message}")]
    PhaseFailed {
        /// Which phase failed.
        phase: RunPhase,
        /// Error details.
        message: String,
    },
}

/// Result alias for run operations.
pub type RunResult<T> = Result<T, RunError>;

// ──────────────────────────────────────────────
// Options, phases and events
// ──────────────────────────────────────────────

/// Options controlling a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Decide everything, build and publish nothing.
    pub dry_run: bool,
}

/// Phases of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Select the release version and write the run output.
    Version,
    /// Resolve module versions and revisions.
    Modules,
    /// Remove earlier builds of this version.
    Cleanup,
    /// Build and publish the locker compiler.
    Locker,
    /// Build missing modules against the locker.
    InternalModules,
    /// Build the full compiler against the fresh modules.
    Quick,
    /// Check that the compiler reproduces itself.
    Stability,
    /// Publish the compiler and modules to public staging.
    Staging,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version => write!(f, "version"),
            Self::Modules => write!(f, "modules"),
            Self::Cleanup => write!(f, "cleanup"),
            Self::Locker => write!(f, "locker"),
            Self::InternalModules => write!(f, "internal modules"),
            Self::Quick => write!(f, "quick"),
            Self::Stability => write!(f, "stability"),
            Self::Staging => write!(f, "staging"),
        }
    }
}

/// Events emitted during a run for progress reporting.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A phase has started.
    PhaseStarted(RunPhase),
    /// A phase has completed.
    PhaseCompleted(RunPhase, PhaseOutcome),
    /// A module build decision was taken.
    ModuleDecided {
        /// Module phase the decision belongs to.
        phase: Phase,
        /// The decision and whether the module was built.
        report: ModuleReport,
    },
}

/// Outcome of a single phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Phase completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Phase was skipped.
    Skipped {
        /// Why the phase was skipped.
        reason: String,
    },
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// The release version.
    pub decision: ReleaseDecision,
    /// Modules with their final `built` flags.
    pub modules: ModuleSet,
    /// Internal module phase decisions.
    pub internal: Vec<ModuleReport>,
    /// Public staging decisions; empty when not staging.
    pub public: Vec<ModuleReport>,
    /// Results of each phase.
    pub phases: Vec<(RunPhase, PhaseOutcome)>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// A run whose version and modules are settled.
#[derive(Debug, Clone)]
pub struct ReadyRun {
    /// The release version.
    pub decision: ReleaseDecision,
    /// Resolved modules.
    pub modules: ModuleSet,
    /// Settings the run was planned with.
    pub settings: RunSettings,
    /// Run options.
    pub options: RunOptions,
}

/// Select the release version and resolve modules.
///
/// A pinned module without its release tag fails here, before any build.
#[instrument(skip_all, fields(root = %settings.root, dry_run = options.dry_run))]
pub fn plan_run(
    settings: &RunSettings,
    services: &Services<'_>,
    options: RunOptions,
) -> RunResult<ReadyRun> {
    let decision = select_release_version(
        &settings.version_request,
        &settings.root,
        services.scm,
        services.build,
    )?;
    let manifest = settings.load_manifest()?;
    let modules = resolve_modules(&settings.module_request(), &manifest, services.scm)?;

    Ok(ReadyRun {
        decision,
        modules,
        settings: settings.clone(),
        options,
    })
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

impl ReadyRun {
    /// Execute every phase.
    ///
    /// Calls `on_event` at phase boundaries and for each module decision.
    #[instrument(skip_all, fields(version = %self.decision.version(), dry_run = self.options.dry_run))]
    pub fn execute(
        self,
        services: &Services<'_>,
        mut on_event: impl FnMut(RunEvent),
    ) -> RunResult<RunOutcome> {
        let Self {
            decision,
            modules,
            settings,
            options,
        } = self;
        let is_dry = options.dry_run;
        let version = decision.version();

        let integration = match (&settings.integration_repo, is_dry) {
            (Some(repo), _) => repo.clone(),
            (None, true) => String::new(),
            (None, false) => return Err(RunError::MissingIntegrationRepo),
        };

        let mut progress = Progress::new(&mut on_event);

        // ── Version (selected in plan) ──
        progress.start(RunPhase::Version);
        let outcome = if is_dry {
            success(format!(
                "{version} ({source}); would write {}",
                settings.output_file,
                source = decision.source()
            ))
        } else {
            write_run_output(&settings.output_file, &decision, services.build)?;
            success(format!(
                "{version} ({source}); wrote {}",
                settings.output_file,
                source = decision.source()
            ))
        };
        progress.complete(RunPhase::Version, outcome);

        // ── Modules (resolved in plan) ──
        progress.start(RunPhase::Modules);
        progress.complete(
            RunPhase::Modules,
            success(format!("Resolved {} modules", modules.len())),
        );

        // ── Cleanup ──
        progress.start(RunPhase::Cleanup);
        let outcome = match services.cleaner {
            _ if is_dry => skipped("dry run"),
            None => skipped("no integration repository cleaner"),
            Some(cleaner) => {
                let removed = cleaner.remove_existing(version)?;
                success(format!("Removed {} existing builds of {version}", removed.len()))
            }
        };
        progress.complete(RunPhase::Cleanup, outcome);

        // ── Locker ──
        progress.start(RunPhase::Locker);
        let outcome = if is_dry {
            success(format!("Would build and publish locker {version}"))
        } else {
            services
                .build
                .run(&locker_invocation(&settings, &decision, &integration))?;
            success(format!("Published locker {version} to {integration}"))
        };
        progress.complete(RunPhase::Locker, outcome);

        // ── Internal modules ──
        let rebuild_options = RebuildOptions {
            force_rebuild: settings.force_rebuild,
            clean: settings.clean,
            work_dir: settings.work_dir.clone(),
            integration_repo: integration.clone(),
        };
        let engine = RebuildEngine::new(
            services.scm,
            services.build,
            services.artifacts,
            &decision,
            &rebuild_options,
        );

        progress.start(RunPhase::InternalModules);
        let internal = if is_dry {
            engine.plan_internal(modules)
        } else {
            engine.build_internal(modules)?
        };
        progress.modules(Phase::Internal, internal.reports());
        let internal_reports = internal.reports().to_vec();
        progress.complete(
            RunPhase::InternalModules,
            module_summary(&internal_reports, is_dry),
        );

        // ── Quick ──
        progress.start(RunPhase::Quick);
        let outcome = if is_dry {
            success(format!("Would build quick {version}"))
        } else {
            services.build.run(&quick_invocation(
                &settings,
                &decision,
                internal.modules(),
                &integration,
            ))?;
            success(format!("Built and published quick {version}"))
        };
        progress.complete(RunPhase::Quick, outcome);

        // ── Stability ──
        progress.start(RunPhase::Stability);
        let outcome = if !settings.test_stability {
            skipped("stability test not requested")
        } else if is_dry {
            success(format!("Would run {}", settings.stability_script))
        } else {
            let base = quick_base(&settings, &decision, internal.modules(), &integration);
            stability_test(&settings.root, services.build, base, &settings.stability_script)?
        };
        progress.complete(RunPhase::Stability, outcome);

        let mut final_modules = internal.modules().clone();

        // ── Public staging ──
        progress.start(RunPhase::Staging);
        let (outcome, public_reports) = if !decision.publish_to_sonatype() {
            (skipped("not publishing to public staging"), Vec::new())
        } else if is_dry {
            let public = engine.plan_public(internal.into_staging());
            progress.modules(Phase::PublicStaging, public.reports());
            final_modules.absorb_built(public.modules());
            let reports = public.reports().to_vec();
            (module_summary(&reports, true), reports)
        } else {
            let message = format!("Scala {version}");
            services
                .build
                .run(&publish_core_invocation(&settings, &decision, &integration))?;
            let closed_core = close_open(services.staging, &settings.staging_profile, &message)?;

            let public = engine.build_public(internal.into_staging())?;
            progress.modules(Phase::PublicStaging, public.reports());
            final_modules.absorb_built(public.modules());
            let closed_modules = close_open(services.staging, &settings.staging_profile, &message)?;

            let reports = public.reports().to_vec();
            let built = reports.iter().filter(|r| r.built).count();
            (
                success(format!(
                    "Staged {version} and {built} modules; closed {} repositories",
                    closed_core + closed_modules
                )),
                reports,
            )
        };
        progress.complete(RunPhase::Staging, outcome);

        let outcome = RunOutcome {
            decision,
            modules: final_modules,
            internal: internal_reports,
            public: public_reports,
            phases: progress.into_phases(),
            dry_run: is_dry,
        };

        info!(
            version = %outcome.decision.version(),
            dry_run = outcome.dry_run,
            "run complete"
        );

        Ok(outcome)
    }
}

/// Phase bookkeeping shared by every step of [`ReadyRun::execute`].
///
/// A `phase` span stays entered from `start` to `complete`, so everything
/// logged inside a phase carries its name.
struct Progress<'e, F: FnMut(RunEvent)> {
    on_event: &'e mut F,
    phases: Vec<(RunPhase, PhaseOutcome)>,
    span: Option<EnteredSpan>,
}

impl<'e, F: FnMut(RunEvent)> Progress<'e, F> {
    const fn new(on_event: &'e mut F) -> Self {
        Self {
            on_event,
            phases: Vec::new(),
            span: None,
        }
    }

    fn start(&mut self, phase: RunPhase) {
        self.span.take();
        self.span = Some(info_span!("phase", %phase).entered());
        debug!("phase started");
        (self.on_event)(RunEvent::PhaseStarted(phase));
    }

    fn complete(&mut self, phase: RunPhase, outcome: PhaseOutcome) {
        debug!(?outcome, "phase completed");
        (self.on_event)(RunEvent::PhaseCompleted(phase, outcome.clone()));
        self.phases.push((phase, outcome));
        self.span.take();
    }

    fn modules(&mut self, phase: Phase, reports: &[ModuleReport]) {
        for report in reports {
            (self.on_event)(RunEvent::ModuleDecided {
                phase,
                report: report.clone(),
            });
        }
    }

    fn into_phases(self) -> Vec<(RunPhase, PhaseOutcome)> {
        self.phases
    }
}

fn success(message: String) -> PhaseOutcome {
    PhaseOutcome::Success { message }
}

fn skipped(reason: &str) -> PhaseOutcome {
    PhaseOutcome::Skipped {
        reason: reason.to_string(),
    }
}

fn module_summary(reports: &[ModuleReport], dry_run: bool) -> PhaseOutcome {
    let building = reports.iter().filter(|r| r.reason.builds()).count();
    let total = reports.len();
    if dry_run {
        success(format!("Would build {building} of {total} modules"))
    } else {
        success(format!("Built {building} of {total} modules"))
    }
}

// ──────────────────────────────────────────────
// Phase implementations
// ──────────────────────────────────────────────

fn bootstrap(stage: BootstrapStage, integration: &str, decision: &ReleaseDecision) -> BuildTask {
    BuildTask::SetupBootstrap {
        stage,
        repository: integration.to_string(),
        version: decision.version().to_string(),
    }
}

/// Locker: a minimal compiler published to the integration repository.
fn locker_invocation(
    settings: &RunSettings,
    decision: &ReleaseDecision,
    integration: &str,
) -> BuildInvocation {
    let invocation = match &settings.starr_version {
        Some(starr) => BuildInvocation::new(&settings.root).property("starr.version", starr.as_str()),
        None => BuildInvocation::new(&settings.root),
    };
    invocation
        .task(bootstrap(BootstrapStage::Starr, integration, decision))
        .task_if(settings.clean, BuildTask::Clean)
        .task(BuildTask::Publish(PublishTarget::Configured))
}

/// Properties and bootstrap shared by the quick build and the stability test.
fn quick_base(
    settings: &RunSettings,
    decision: &ReleaseDecision,
    modules: &ModuleSet,
    integration: &str,
) -> BuildInvocation {
    BuildInvocation::new(&settings.root)
        .property("starr.version", decision.version().to_string())
        .properties(
            modules
                .iter()
                .map(|m| (m.id().manifest_key(), m.version().as_str())),
        )
        .property("scala.binary.version", decision.binary_version().as_str())
        .properties(
            settings
                .build_properties
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        )
        .task(bootstrap(BootstrapStage::Quick, integration, decision))
}

fn quick_invocation(
    settings: &RunSettings,
    decision: &ReleaseDecision,
    modules: &ModuleSet,
    integration: &str,
) -> BuildInvocation {
    let base = quick_base(settings, decision, modules, integration).task_if(settings.clean, BuildTask::Clean);
    settings
        .quick_tasks
        .iter()
        .fold(base, |inv, task| inv.task(BuildTask::Custom(task.clone())))
        .task(BuildTask::MakeQuick)
        .task(BuildTask::Publish(PublishTarget::Configured))
}

/// Signed publish of the quick build to public staging.
fn publish_core_invocation(
    settings: &RunSettings,
    decision: &ReleaseDecision,
    integration: &str,
) -> BuildInvocation {
    BuildInvocation::new(&settings.root)
        .task(bootstrap(BootstrapStage::Publish, integration, decision))
        .task(BuildTask::Publish(PublishTarget::Staging))
}

/// Close every open staging repository of `profile`. Returns how many.
fn close_open(staging: &dyn StagingApi, profile: &str, message: &str) -> RunResult<usize> {
    let ids: Vec<String> = staging
        .list_open(profile)?
        .into_iter()
        .map(|repo| repo.id)
        .collect();
    if ids.is_empty() {
        debug!(profile, "no open staging repositories");
        return Ok(0);
    }
    staging.close(&ids, message)?;
    Ok(ids.len())
}

/// Rebuild the compiler with quick and compare the two with the stability
/// script.
///
/// `build/quick` is moved aside while the new build runs, the result lands
/// in `build/strap`, and `build/quick` is put back before the comparison.
fn stability_test(
    root: &Utf8Path,
    build: &dyn BuildTool,
    base: BuildInvocation,
    script: &Utf8Path,
) -> RunResult<PhaseOutcome> {
    let build_dir = root.join("build");
    let quick = build_dir.join("quick");
    let strap = build_dir.join("strap");
    let saved = root.join("quick.saved");

    move_dir(&quick, &saved)?;
    let compile = base
        .task(BuildTask::Compile("library".into()))
        .task(BuildTask::Compile("reflect".into()))
        .task(BuildTask::Compile("compiler".into()));
    let strapped = build
        .run(&compile)
        .map_err(RunError::from)
        .and_then(|()| move_dir(&quick, &strap));
    // The operator's quick build goes back whatever happened above.
    let restored = move_dir(&saved, &quick);
    strapped?;
    restored?;

    debug!(%script, "running stability script");
    let output = Command::new("sh")
        .arg(script.as_str())
        .current_dir(root.as_std_path())
        .output()
        .map_err(|e| RunError::PhaseFailed {
            phase: RunPhase::Stability,
            message: format!("failed to execute {script}: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(RunError::PhaseFailed {
            phase: RunPhase::Stability,
            message: format!("stability test failed: {stderr}"),
        });
    }

    Ok(success("quick and strap compilers are identical".into()))
}

/// Rename `from` to `to`, replacing anything already at `to`.
fn move_dir(from: &Utf8Path, to: &Utf8Path) -> RunResult<()> {
    let failed = |e: std::io::Error| RunError::PhaseFailed {
        phase: RunPhase::Stability,
        message: format!("moving {from} to {to}: {e}"),
    };
    if to.exists() {
        std::fs::remove_dir_all(to).map_err(failed)?;
    }
    std::fs::rename(from, to).map_err(failed)
}
