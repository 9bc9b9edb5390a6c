//! Module rebuild decisions and module builds.
//!
//! A module is rebuilt when it was already built in this run, when a
//! rebuild is forced, or when no artifact for it can be resolved. The two
//! build phases form a small state machine:
//!
//! ```text
//! ModuleSet --build_internal--> InternalBuild --into_staging--> ModuleSet --build_public--> PublicBuild
//! ```
//!
//! `built` flags carry from the internal phase into the public one, so
//! anything built internally is rebuilt (signed) for staging.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{ArtifactResolver, CrossVersion};
use crate::build::{BuildInvocation, BuildTask, BuildTool, PublishTarget, Setting};
use crate::git::SourceControl;
use crate::modules::{ModuleId, ModuleSet, ModuleSpec};
use crate::release::ReleaseDecision;

/// Errors from module builds.
#[derive(Error, Debug)]
pub enum RebuildError {
    /// Fetching a module failed.
    #[error("fetching {module} failed: {source}")]
    Fetch {
        /// The module.
        module: ModuleId,
        /// Underlying git error.
        source: crate::git::GitError,
    },

    /// Building a module failed.
    #[error("building {module} failed: {source}")]
    Build {
        /// The module.
        module: ModuleId,
        /// Underlying build error.
        source: crate::build::BuildError,
    },
}

/// Result alias for module builds.
pub type RebuildResult<T> = Result<T, RebuildError>;

/// Which module phase is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Build against the locker compiler, publish to the integration repository.
    Internal,
    /// Signed build for the public staging system.
    PublicStaging,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::PublicStaging => write!(f, "public-staging"),
        }
    }
}

/// Why a module is or is not built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildReason {
    /// Built earlier in this run.
    AlreadyBuilt,
    /// Rebuild forced by configuration.
    Forced,
    /// No published artifact was found.
    NotPublished,
    /// Already published; skipped.
    Published,
}

impl BuildReason {
    /// Whether this reason means the module gets built.
    pub const fn builds(self) -> bool {
        !matches!(self, Self::Published)
    }
}

impl fmt::Display for BuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyBuilt => write!(f, "built earlier in this run"),
            Self::Forced => write!(f, "rebuild forced"),
            Self::NotPublished => write!(f, "not published"),
            Self::Published => write!(f, "already published"),
        }
    }
}

/// Verdict for one module in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildDecision {
    /// Whether to build.
    pub build: bool,
    /// Why.
    pub reason: BuildReason,
}

impl From<BuildReason> for BuildDecision {
    fn from(reason: BuildReason) -> Self {
        Self {
            build: reason.builds(),
            reason,
        }
    }
}

/// Outcome for one module in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    /// The module.
    pub id: ModuleId,
    /// Its version.
    pub version: String,
    /// Why it was or was not built.
    pub reason: BuildReason,
    /// Whether it was built in this phase.
    pub built: bool,
}

/// `built || force_rebuild || !exists()`; `exists` runs only when needed.
pub fn needs_build(built: bool, force_rebuild: bool, exists: impl FnOnce() -> bool) -> bool {
    built || force_rebuild || !exists()
}

/// Modules after the internal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalBuild {
    modules: ModuleSet,
    reports: Vec<ModuleReport>,
}

impl InternalBuild {
    /// Modules with their `built` flags.
    pub const fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    /// Per-module outcomes.
    pub fn reports(&self) -> &[ModuleReport] {
        &self.reports
    }

    /// Modules to stage publicly, keeping their `built` flags.
    pub fn into_staging(self) -> ModuleSet {
        self.modules.retain(|m| m.id().publicly_staged())
    }
}

/// Modules after the public staging phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicBuild {
    modules: ModuleSet,
    reports: Vec<ModuleReport>,
}

impl PublicBuild {
    /// Modules with their `built` flags.
    pub const fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    /// Per-module outcomes.
    pub fn reports(&self) -> &[ModuleReport] {
        &self.reports
    }
}

/// Settings for module builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildOptions {
    /// Build every module regardless of what is published.
    pub force_rebuild: bool,
    /// Run `clean` before building.
    pub clean: bool,
    /// Where module checkouts live.
    pub work_dir: Utf8PathBuf,
    /// Integration repository: resolver for all builds, publish target for
    /// the internal phase.
    pub integration_repo: String,
}

/// Decides and performs module builds.
pub struct RebuildEngine<'a> {
    scm: &'a dyn SourceControl,
    build: &'a dyn BuildTool,
    artifacts: &'a dyn ArtifactResolver,
    decision: &'a ReleaseDecision,
    options: &'a RebuildOptions,
}

impl<'a> RebuildEngine<'a> {
    /// Create an engine for one run.
    pub fn new(
        scm: &'a dyn SourceControl,
        build: &'a dyn BuildTool,
        artifacts: &'a dyn ArtifactResolver,
        decision: &'a ReleaseDecision,
        options: &'a RebuildOptions,
    ) -> Self {
        Self {
            scm,
            build,
            artifacts,
            decision,
            options,
        }
    }

    /// Decide whether `spec` needs building in `phase`.
    ///
    /// A failed artifact query counts as "not published".
    #[instrument(level = "debug", skip(self, spec), fields(module = %spec.id()))]
    pub fn decide(&self, phase: Phase, spec: &ModuleSpec) -> BuildDecision {
        let built = spec.is_built();
        let force = self.options.force_rebuild;
        let cross = CrossVersion::Binary(self.decision.binary_version().clone());
        let exists = || match self.artifacts.resolves(&spec.coordinates(), &cross) {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "artifact query failed; assuming not published");
                false
            }
        };

        let reason = match (needs_build(built, force, exists), built, force) {
            (false, _, _) => BuildReason::Published,
            (true, true, _) => BuildReason::AlreadyBuilt,
            (true, false, true) => BuildReason::Forced,
            (true, false, false) => BuildReason::NotPublished,
        };
        debug!(%phase, %reason, "rebuild decision");
        reason.into()
    }

    /// Decide every module without building anything.
    pub fn plan(&self, phase: Phase, modules: &ModuleSet) -> Vec<ModuleReport> {
        modules
            .iter()
            .map(|spec| {
                let decision = self.decide(phase, spec);
                report(spec, decision.reason, false)
            })
            .collect()
    }

    /// Dry-run counterpart of [`build_internal`](Self::build_internal).
    ///
    /// Nothing is fetched or built, but modules that would build are
    /// marked built so [`plan_public`](Self::plan_public) sees the same
    /// flags a real run would.
    pub fn plan_internal(&self, mut modules: ModuleSet) -> InternalBuild {
        let reports = self.simulate_phase(Phase::Internal, &mut modules);
        InternalBuild { modules, reports }
    }

    /// Dry-run counterpart of [`build_public`](Self::build_public).
    pub fn plan_public(&self, mut modules: ModuleSet) -> PublicBuild {
        let reports = self.simulate_phase(Phase::PublicStaging, &mut modules);
        PublicBuild { modules, reports }
    }

    fn simulate_phase(&self, phase: Phase, modules: &mut ModuleSet) -> Vec<ModuleReport> {
        modules
            .iter_mut()
            .map(|spec| {
                let decision = self.decide(phase, spec);
                if decision.build {
                    spec.mark_built();
                }
                report(spec, decision.reason, false)
            })
            .collect()
    }

    /// Internal phase: build missing modules against the locker compiler
    /// and publish them to the integration repository.
    #[instrument(skip_all, fields(modules = modules.len()))]
    pub fn build_internal(&self, mut modules: ModuleSet) -> RebuildResult<InternalBuild> {
        let reports = self.run_phase(Phase::Internal, &mut modules)?;
        Ok(InternalBuild { modules, reports })
    }

    /// Public phase: rebuild modules with signing for public staging.
    #[instrument(skip_all, fields(modules = modules.len()))]
    pub fn build_public(&self, mut modules: ModuleSet) -> RebuildResult<PublicBuild> {
        let reports = self.run_phase(Phase::PublicStaging, &mut modules)?;
        Ok(PublicBuild { modules, reports })
    }

    fn run_phase(&self, phase: Phase, modules: &mut ModuleSet) -> RebuildResult<Vec<ModuleReport>> {
        let mut reports = Vec::with_capacity(modules.len());
        for spec in modules.iter_mut() {
            let decision = self.decide(phase, spec);
            if decision.build {
                info!(module = %spec.id(), version = %spec.version(), %phase, reason = %decision.reason, "building module");
                self.build_module(phase, spec)?;
                spec.mark_built();
            } else {
                info!(module = %spec.id(), version = %spec.version(), %phase, "module already published; skipping");
            }
            reports.push(report(spec, decision.reason, decision.build));
        }
        Ok(reports)
    }

    #[instrument(name = "module", skip_all, fields(module = %spec.id(), version = %spec.version(), %phase))]
    fn build_module(&self, phase: Phase, spec: &ModuleSpec) -> RebuildResult<()> {
        let id = spec.id();
        let dir = self.options.work_dir.join(id.artifact_id());
        let tree = self
            .scm
            .fetch(id.owner(), id.repo(), spec.revision(), &dir)
            .map_err(|source| RebuildError::Fetch { module: id, source })?;

        let invocation = module_invocation(phase, spec, self.decision, self.options, &tree.path);
        debug!(tasks = invocation.tasks.len(), "module invocation");
        self.build
            .run(&invocation)
            .map_err(|source| RebuildError::Build { module: id, source })
    }
}

fn module_invocation(
    phase: Phase,
    spec: &ModuleSpec,
    decision: &ReleaseDecision,
    options: &RebuildOptions,
    dir: &Utf8Path,
) -> BuildInvocation {
    let target = match phase {
        Phase::Internal => PublishTarget::Repository(options.integration_repo.clone()),
        Phase::PublicStaging => PublishTarget::Staging,
    };
    BuildInvocation::new(dir)
        .setting(Setting::Version(spec.version().to_string()))
        .setting(Setting::ScalaVersion(decision.version().to_string()))
        .setting(Setting::Resolver(options.integration_repo.clone()))
        .task_if(options.clean, BuildTask::Clean)
        .task_if(phase == Phase::PublicStaging, BuildTask::Doc)
        .task(BuildTask::Test)
        .task(BuildTask::Publish(target))
}

fn report(spec: &ModuleSpec, reason: BuildReason, built: bool) -> ModuleReport {
    ModuleReport {
        id: spec.id(),
        version: spec.version().to_string(),
        reason,
        built,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::modules::ModuleVersion;
    use crate::testing::{FakeArtifacts, FakeBuild, FakeScm, explicit_decision};
    use crate::version::Revision;

    fn options(force_rebuild: bool) -> RebuildOptions {
        RebuildOptions {
            force_rebuild,
            clean: true,
            work_dir: Utf8PathBuf::from("/work/modules"),
            integration_repo: "https://ci.example/artifactory/integration/".into(),
        }
    }

    fn spec(id: ModuleId, version: &str) -> ModuleSpec {
        ModuleSpec::new(id, ModuleVersion::new(id, version).unwrap(), Revision::tag_for(version))
    }

    fn modules() -> ModuleSet {
        ModuleSet::new(vec![
            spec(ModuleId::Xml, "1.0.6"),
            spec(ModuleId::ParserCombinators, "1.0.5"),
            spec(ModuleId::Swing, "2.0.0"),
            spec(ModuleId::Partest, "1.1.0"),
            spec(ModuleId::Scalacheck, "1.13.4"),
        ])
    }

    #[test]
    fn needs_build_truth_table() {
        assert!(needs_build(true, false, || true));
        assert!(needs_build(false, true, || true));
        assert!(needs_build(false, false, || false));
        assert!(!needs_build(false, false, || true));
    }

    #[test]
    fn needs_build_is_lazy() {
        let calls = Cell::new(0);
        let exists = || {
            calls.set(calls.get() + 1);
            true
        };
        assert!(needs_build(true, false, exists));
        assert!(needs_build(false, true, || {
            calls.set(calls.get() + 1);
            true
        }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn decide_reasons() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default().with_published("scala-xml", "1.0.6");
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let mut xml = spec(ModuleId::Xml, "1.0.6");
        assert_eq!(engine.decide(Phase::Internal, &xml).reason, BuildReason::Published);
        assert!(!engine.decide(Phase::Internal, &xml).build);

        let swing = spec(ModuleId::Swing, "2.0.0");
        assert_eq!(engine.decide(Phase::Internal, &swing).reason, BuildReason::NotPublished);

        xml.mark_built();
        assert_eq!(engine.decide(Phase::Internal, &xml).reason, BuildReason::AlreadyBuilt);
        assert!(engine.decide(Phase::PublicStaging, &xml).build);
    }

    #[test]
    fn query_error_counts_as_not_published() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default().failing();
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let d = engine.decide(Phase::Internal, &spec(ModuleId::Xml, "1.0.6"));
        assert_eq!(d, BuildDecision { build: true, reason: BuildReason::NotPublished });
    }

    #[test]
    fn queries_with_binary_cross_version() {
        let decision = explicit_decision("2.12.0", "-M5");
        let artifacts = FakeArtifacts::default();
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        engine.decide(Phase::Internal, &spec(ModuleId::Xml, "1.0.6"));
        assert_eq!(artifacts.queries(), vec!["scala-xml_2.12.0-M5:1.0.6".to_string()]);
    }

    #[test]
    fn force_rebuild_builds_everything_without_queries() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default().with_published("scala-xml", "1.0.6");
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(true);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let internal = engine.build_internal(modules()).unwrap();
        assert!(internal.modules().iter().all(ModuleSpec::is_built));
        assert!(internal.reports().iter().all(|r| r.reason == BuildReason::Forced));
        assert!(artifacts.queries().is_empty());
        assert_eq!(build.invocations().len(), 5);
    }

    #[test]
    fn internal_phase_skips_published_and_publishes_to_integration() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default()
            .with_published("scala-xml", "1.0.6")
            .with_published("scala-parser-combinators", "1.0.5")
            .with_published("scalacheck", "1.13.4");
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let internal = engine.build_internal(modules()).unwrap();
        let built: Vec<ModuleId> = internal
            .modules()
            .iter()
            .filter(|m| m.is_built())
            .map(ModuleSpec::id)
            .collect();
        assert_eq!(built, vec![ModuleId::Swing, ModuleId::Partest]);

        let fetched: Vec<String> = scm.fetched().into_iter().map(|f| f.0).collect();
        assert_eq!(fetched, vec!["scala/scala-swing", "scala/scala-partest"]);

        let runs = build.invocations();
        assert_eq!(runs[0].dir, "/work/modules/scala-swing");
        assert_eq!(
            runs[0].settings,
            vec![
                Setting::Version("2.0.0".into()),
                Setting::ScalaVersion("2.12.1".into()),
                Setting::Resolver("https://ci.example/artifactory/integration/".into()),
            ]
        );
        assert_eq!(
            runs[0].tasks,
            vec![
                BuildTask::Clean,
                BuildTask::Test,
                BuildTask::Publish(PublishTarget::Repository(
                    "https://ci.example/artifactory/integration/".into()
                )),
            ]
        );
    }

    #[test]
    fn public_phase_rebuilds_internally_built_modules_with_docs() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default()
            .with_published("scala-xml", "1.0.6")
            .with_published("scala-parser-combinators", "1.0.5")
            .with_published("scala-partest", "1.1.0");
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let internal = engine.build_internal(modules()).unwrap();
        let staged = internal.into_staging();
        assert!(staged.get(ModuleId::Scalacheck).is_none());
        assert!(staged.get(ModuleId::Swing).unwrap().is_built());

        let before = build.invocations().len();
        let public = engine.build_public(staged).unwrap();
        let reasons: Vec<(ModuleId, BuildReason)> =
            public.reports().iter().map(|r| (r.id, r.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                (ModuleId::Xml, BuildReason::Published),
                (ModuleId::ParserCombinators, BuildReason::Published),
                (ModuleId::Swing, BuildReason::AlreadyBuilt),
                (ModuleId::Partest, BuildReason::Published),
            ]
        );

        let runs = build.invocations();
        assert_eq!(runs.len(), before + 1);
        assert_eq!(
            runs[before].tasks,
            vec![
                BuildTask::Clean,
                BuildTask::Doc,
                BuildTask::Test,
                BuildTask::Publish(PublishTarget::Staging),
            ]
        );
    }

    #[test]
    fn built_flags_never_reset() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default();
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let internal = engine.build_internal(modules()).unwrap();
        let public = engine.build_public(internal.into_staging()).unwrap();
        assert!(public.modules().iter().all(ModuleSpec::is_built));
        assert!(public.reports().iter().all(|r| r.reason == BuildReason::AlreadyBuilt));
    }

    #[test]
    fn build_failure_stops_the_phase() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default();
        let scm = FakeScm::default();
        let build = FakeBuild::default().failing_in("scala-parser-combinators");
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let err = engine.build_internal(modules()).unwrap_err();
        assert!(matches!(
            err,
            RebuildError::Build { module: ModuleId::ParserCombinators, .. }
        ));
        assert_eq!(build.invocations().len(), 2);
    }

    #[test]
    fn plan_has_no_side_effects() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default().with_published("scala-xml", "1.0.6");
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let plan = engine.plan(Phase::Internal, &modules());
        assert_eq!(plan.len(), 5);
        assert_eq!(plan[0].reason, BuildReason::Published);
        assert_eq!(plan[1].reason, BuildReason::NotPublished);
        assert!(plan.iter().all(|r| !r.built));
        assert!(build.invocations().is_empty());
        assert!(scm.fetched().is_empty());
    }

    #[test]
    fn dry_run_phases_carry_flags_without_building() {
        let decision = explicit_decision("2.12.1", "");
        let artifacts = FakeArtifacts::default().with_published("scala-xml", "1.0.6");
        let (scm, build) = (FakeScm::default(), FakeBuild::default());
        let opts = options(false);
        let engine = RebuildEngine::new(&scm, &build, &artifacts, &decision, &opts);

        let internal = engine.plan_internal(modules());
        assert!(!internal.modules().get(ModuleId::Xml).unwrap().is_built());
        assert!(internal.modules().get(ModuleId::Swing).unwrap().is_built());

        let public = engine.plan_public(internal.into_staging());
        let reasons: Vec<BuildReason> = public.reports().iter().map(|r| r.reason).collect();
        assert_eq!(
            reasons,
            vec![
                BuildReason::Published,
                BuildReason::AlreadyBuilt,
                BuildReason::AlreadyBuilt,
                BuildReason::AlreadyBuilt,
            ]
        );
        assert!(public.reports().iter().all(|r| !r.built));
        assert!(build.invocations().is_empty());
        assert!(scm.fetched().is_empty());
    }
}
