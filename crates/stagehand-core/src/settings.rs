//! Run settings resolved from [`Config`].
//!
//! Every optional config value gets its default here, once, so the rest of
//! the run reads plain values. Paths are resolved against the compiler
//! checkout root.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::modules::ModuleId;
use crate::modules::resolve::{ModuleOverride, ModuleRequest, ModuleStrategy};
use crate::properties::{Properties, PropertiesResult};
use crate::release::VersionRequest;

/// Default run output file.
pub const DEFAULT_OUTPUT_FILE: &str = "release.properties";
/// Default version manifest.
pub const DEFAULT_MANIFEST: &str = "versions.properties";
/// Default module checkout directory.
pub const DEFAULT_WORK_DIR: &str = "target/modules";
/// Default stability comparison script.
pub const DEFAULT_STABILITY_SCRIPT: &str = "tools/stability-test.sh";
/// Default build tool.
pub const DEFAULT_BUILD_COMMAND: &str = "sbt";
/// Default resolver for published modules.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";
/// Default group path removed before a run.
pub const DEFAULT_CLEANUP_GROUP: &str = "org/scala-lang";
/// Default staging API root.
pub const DEFAULT_STAGING_URL: &str = "https://oss.sonatype.org/service/local";
/// Default staging profile.
pub const DEFAULT_STAGING_PROFILE: &str = "org.scala-lang";

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSettings {
    /// Compiler checkout root.
    pub root: Utf8PathBuf,
    /// Version selection inputs.
    #[serde(skip)]
    pub version_request: VersionRequest,
    /// Module strategy.
    pub strategy: ModuleStrategy,
    /// Modules to build, in build order.
    pub modules: Vec<ModuleId>,
    /// Per-module overrides.
    pub overrides: BTreeMap<ModuleId, ModuleOverride>,
    /// Version manifest path.
    pub manifest: Utf8PathBuf,
    /// Module checkout directory.
    pub work_dir: Utf8PathBuf,
    /// Build modules even when published.
    pub force_rebuild: bool,
    /// Run the stability test.
    pub test_stability: bool,
    /// Stability comparison script.
    pub stability_script: Utf8PathBuf,
    /// Prompt before running.
    pub confirm: bool,
    /// Run output path.
    pub output_file: Utf8PathBuf,
    /// Compiler version building the locker, when pinned.
    pub starr_version: Option<String>,
    /// Build tool executable.
    pub build_command: String,
    /// Extra build tool arguments.
    pub build_args: Vec<String>,
    /// Run `clean` before builds.
    pub clean: bool,
    /// Extra quick-build tasks.
    pub quick_tasks: Vec<String>,
    /// Extra quick-build properties.
    pub build_properties: BTreeMap<String, String>,
    /// Integration repository.
    pub integration_repo: Option<String>,
    /// Repositories queried for published modules.
    pub resolvers: Vec<String>,
    /// Group path cleaned before a run.
    pub cleanup_group: String,
    /// Staging API root.
    pub staging_url: String,
    /// Staging profile.
    pub staging_profile: String,
    /// netrc for HTTP requests.
    pub netrc: Option<Utf8PathBuf>,
}

impl RunSettings {
    /// Resolve settings for a run in the compiler checkout at `root`.
    #[instrument(skip(config))]
    pub fn from_config(config: &Config, root: &Utf8Path) -> Self {
        let release = config.release.clone().unwrap_or_default();
        let modules = config.modules.clone().unwrap_or_default();
        let build = config.build.clone().unwrap_or_default();
        let repositories = config.repositories.clone().unwrap_or_default();
        let staging = config.staging.clone().unwrap_or_default();

        let mut ids = ModuleId::DEFAULT_ORDER.to_vec();
        if modules.build_scalacheck.unwrap_or(false) {
            ids.push(ModuleId::Scalacheck);
        }

        let at_root = |path: Option<Utf8PathBuf>, default: &str| {
            let path = path.unwrap_or_else(|| Utf8PathBuf::from(default));
            if path.is_absolute() { path } else { root.join(path) }
        };

        let settings = Self {
            root: root.to_path_buf(),
            version_request: VersionRequest {
                base: release.version_base,
                suffix: release.version_suffix,
                publish_override: release.publish_to_sonatype,
            },
            strategy: modules.strategy.unwrap_or_default(),
            modules: ids,
            overrides: modules.overrides.unwrap_or_default(),
            manifest: at_root(modules.manifest, DEFAULT_MANIFEST),
            work_dir: at_root(modules.work_dir, DEFAULT_WORK_DIR),
            force_rebuild: release.force_rebuild.unwrap_or(false),
            test_stability: release.test_stability.unwrap_or(false),
            stability_script: at_root(release.stability_script, DEFAULT_STABILITY_SCRIPT),
            confirm: release.confirm.unwrap_or(true),
            output_file: at_root(release.output_file, DEFAULT_OUTPUT_FILE),
            starr_version: release.starr_version,
            build_command: build.command.unwrap_or_else(|| DEFAULT_BUILD_COMMAND.to_string()),
            build_args: build.args.unwrap_or_default(),
            clean: build.clean.unwrap_or(true),
            quick_tasks: build.quick_tasks.unwrap_or_default(),
            build_properties: build.properties.unwrap_or_default(),
            integration_repo: repositories.integration,
            resolvers: repositories
                .resolvers
                .unwrap_or_else(|| vec![MAVEN_CENTRAL.to_string()]),
            cleanup_group: repositories
                .cleanup_group
                .unwrap_or_else(|| DEFAULT_CLEANUP_GROUP.to_string()),
            staging_url: staging.url.unwrap_or_else(|| DEFAULT_STAGING_URL.to_string()),
            staging_profile: staging
                .profile
                .unwrap_or_else(|| DEFAULT_STAGING_PROFILE.to_string()),
            netrc: staging.netrc,
        };
        debug!(strategy = ?settings.strategy, modules = settings.modules.len(), "run settings resolved");
        settings
    }

    /// Module resolution inputs.
    pub fn module_request(&self) -> ModuleRequest {
        ModuleRequest {
            strategy: self.strategy,
            modules: self.modules.clone(),
            overrides: self.overrides.clone(),
            work_dir: self.work_dir.clone(),
        }
    }

    /// Repositories queried for published modules: integration first.
    pub fn artifact_repositories(&self) -> Vec<String> {
        self.integration_repo
            .iter()
            .chain(self.resolvers.iter())
            .cloned()
            .collect()
    }

    /// Load the version manifest.
    ///
    /// Nightly module resolution never reads it, so a missing manifest is
    /// an empty one under that strategy.
    pub fn load_manifest(&self) -> PropertiesResult<Properties> {
        if self.strategy == ModuleStrategy::Nightly && !self.manifest.exists() {
            return Ok(Properties::new());
        }
        Properties::load(&self.manifest)
    }
}
