//! Build tool boundary.
//!
//! The release core describes *what* to build with a [`BuildInvocation`]:
//! a working directory, system properties, typed [`Setting`]s and an
//! ordered list of [`BuildTask`]s. A [`BuildTool`] adapter turns that into
//! a concrete command line. The only adapter shipped is
//! [`SbtTool`](crate::sbt::SbtTool); nothing outside it knows sbt syntax.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;

use crate::version::Version;

/// Errors from build tool invocations.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Failed to spawn the build tool.
    #[error("failed to run {tool}: {source}")]
    Exec {
        /// Build tool command.
        tool: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The build tool exited with a non-zero status.
    #[error("{tool} failed in {dir} (exit code {exit_code:?}): {stderr}")]
    Failed {
        /// Build tool command.
        tool: String,
        /// Directory the build ran in.
        dir: Utf8PathBuf,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Tail of captured stderr.
        stderr: String,
    },
}

/// Result alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Where a `publish` task sends artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "url")]
pub enum PublishTarget {
    /// Whatever repository the build itself is set up to publish to.
    Configured,
    /// An explicit repository URL (the integration repository).
    Repository(String),
    /// Signed publishing to the public staging system.
    Staging,
}

/// Which bootstrap stage the compiler build is set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStage {
    /// Build the minimal locker compiler.
    Starr,
    /// Build the full compiler against the locker and fresh modules.
    Quick,
    /// Re-publish an existing build for staging.
    Publish,
}

/// A single build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTask {
    /// Remove previous build output.
    Clean,
    /// Run the test suite.
    Test,
    /// Generate API documentation.
    Doc,
    /// Publish artifacts.
    Publish(PublishTarget),
    /// Write `buildcharacter.properties` with the given suffix template.
    GenerateBuildCharacter {
        /// Suffix template handed to the generator (e.g. `SHA-NIGHTLY`).
        suffix_template: String,
    },
    /// Configure the compiler build for a bootstrap stage.
    SetupBootstrap {
        /// The stage being set up.
        stage: BootstrapStage,
        /// Repository to resolve from and publish to.
        repository: String,
        /// Compiler version being built.
        version: String,
    },
    /// Compile one subproject.
    Compile(String),
    /// Assemble the quick distribution.
    MakeQuick,
    /// A task name passed through verbatim from configuration.
    Custom(String),
}

/// A typed build setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    /// Version of the project being built.
    Version(String),
    /// Compiler version to build against.
    ScalaVersion(String),
    /// An extra repository to resolve dependencies from.
    Resolver(String),
}

/// A complete description of one build tool run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInvocation {
    /// Directory to run in.
    pub dir: Utf8PathBuf,
    /// System properties.
    pub properties: BTreeMap<String, String>,
    /// Settings applied before any task.
    pub settings: Vec<Setting>,
    /// Tasks, in order.
    pub tasks: Vec<BuildTask>,
}

impl BuildInvocation {
    /// Start an invocation in `dir`.
    pub fn new(dir: &Utf8Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            properties: BTreeMap::new(),
            settings: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Add a system property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add several system properties.
    #[must_use]
    pub fn properties<'a>(mut self, props: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (k, v) in props {
            self.properties.insert(k.to_string(), v.to_string());
        }
        self
    }

    /// Add a setting.
    #[must_use]
    pub fn setting(mut self, setting: Setting) -> Self {
        self.settings.push(setting);
        self
    }

    /// Append a task.
    #[must_use]
    pub fn task(mut self, task: BuildTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Append a task only when `enabled`.
    #[must_use]
    pub fn task_if(self, enabled: bool, task: BuildTask) -> Self {
        if enabled { self.task(task) } else { self }
    }
}

/// A build tool adapter.
pub trait BuildTool {
    /// Run the invocation to completion. Non-zero exit is an error.
    fn run(&self, invocation: &BuildInvocation) -> BuildResult<()>;

    /// The option string a distribution packaging job needs to build
    /// exactly `version`.
    fn dist_version_override(&self, version: &Version) -> String;
}
