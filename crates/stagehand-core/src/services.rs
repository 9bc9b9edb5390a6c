//! Collaborators of a run.
//!
//! [`Services`] borrows each collaborator as a trait object so the run
//! logic can be driven by in-memory fakes. [`Toolchain`] owns the real
//! adapters built from [`RunSettings`].

use tracing::debug;

use crate::artifacts::{ArtifactResolver, MavenRepoResolver};
use crate::build::BuildTool;
use crate::cleanup::{ArtifactoryCleaner, BuildCleaner};
use crate::git::{GitSourceControl, SourceControl};
use crate::http::Curl;
use crate::sbt::SbtTool;
use crate::settings::RunSettings;
use crate::staging::{NexusStaging, StagingApi};

/// Borrowed collaborators for one run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    /// Source control.
    pub scm: &'a dyn SourceControl,
    /// Build tool.
    pub build: &'a dyn BuildTool,
    /// Artifact existence queries.
    pub artifacts: &'a dyn ArtifactResolver,
    /// Public staging API.
    pub staging: &'a dyn StagingApi,
    /// Existing-build cleanup; absent without an integration repository.
    pub cleaner: Option<&'a dyn BuildCleaner>,
}

/// The production adapters.
#[derive(Debug, Clone)]
pub struct Toolchain {
    scm: GitSourceControl,
    build: SbtTool,
    artifacts: MavenRepoResolver,
    staging: NexusStaging,
    cleaner: Option<ArtifactoryCleaner>,
}

impl Toolchain {
    /// Build the adapters for `settings`.
    pub fn from_settings(settings: &RunSettings) -> Self {
        let curl = Curl::new(settings.netrc.clone());
        let cleaner = settings
            .integration_repo
            .as_ref()
            .map(|repo| ArtifactoryCleaner::new(repo.as_str(), settings.cleanup_group.as_str(), curl.clone()));
        debug!(
            build = %settings.build_command,
            cleanup = cleaner.is_some(),
            "toolchain assembled"
        );
        Self {
            scm: GitSourceControl::new(),
            build: SbtTool::new(settings.build_command.as_str(), settings.build_args.clone()),
            artifacts: MavenRepoResolver::new(settings.artifact_repositories(), curl.clone()),
            staging: NexusStaging::new(settings.staging_url.as_str(), curl),
            cleaner,
        }
    }

    /// Borrow the adapters as [`Services`].
    pub fn services(&self) -> Services<'_> {
        Services {
            scm: &self.scm,
            build: &self.build,
            artifacts: &self.artifacts,
            staging: &self.staging,
            cleaner: self.cleaner.as_ref().map(|c| c as &dyn BuildCleaner),
        }
    }

    /// The staging adapter, for operator commands.
    pub const fn staging(&self) -> &NexusStaging {
        &self.staging
    }
}
