//! Artifact existence queries.
//!
//! A module counts as published when its pom can be fetched from any of the
//! configured Maven repositories under the cross-versioned artifact name.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::http::{Curl, HttpError};
use crate::version::BinaryVersion;

/// Errors from artifact queries.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// A repository could not be queried.
    #[error("artifact query against {repository} failed: {source}")]
    Query {
        /// Repository base URL.
        repository: String,
        /// Underlying HTTP error.
        source: HttpError,
    },
}

/// Result alias for artifact queries.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Maven coordinates of a module, before cross-versioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coordinates {
    /// Dotted group id (`org.scala-lang.modules`).
    pub group_id: String,
    /// Base artifact id (`scala-xml`).
    pub artifact_id: String,
    /// Module version.
    pub version: String,
}

/// How the artifact id is suffixed with the compiler version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossVersion {
    /// `<artifact>_<binary version>`.
    Binary(BinaryVersion),
    /// `<artifact>_<full compiler version>`.
    Full(String),
    /// The artifact id unchanged.
    Disabled,
}

impl CrossVersion {
    /// Apply the cross-version suffix to `artifact_id`.
    pub fn artifact_name(&self, artifact_id: &str) -> String {
        match self {
            Self::Binary(binary) => format!("{artifact_id}_{binary}"),
            Self::Full(full) => format!("{artifact_id}_{full}"),
            Self::Disabled => artifact_id.to_string(),
        }
    }
}

/// Maven repository path of the pom for `coordinates`.
pub fn pom_path(coordinates: &Coordinates, cross: &CrossVersion) -> String {
    let name = cross.artifact_name(&coordinates.artifact_id);
    format!(
        "{}/{name}/{version}/{name}-{version}.pom",
        coordinates.group_id.replace('.', "/"),
        version = coordinates.version,
    )
}

/// Answers whether an artifact has already been published.
pub trait ArtifactResolver {
    /// `true` when the artifact is resolvable from at least one repository.
    fn resolves(&self, coordinates: &Coordinates, cross: &CrossVersion) -> ArtifactResult<bool>;
}

/// [`ArtifactResolver`] probing Maven-layout repositories over HTTP.
#[derive(Debug, Clone)]
pub struct MavenRepoResolver {
    repositories: Vec<String>,
    curl: Curl,
}

impl MavenRepoResolver {
    /// Query `repositories` in order.
    pub const fn new(repositories: Vec<String>, curl: Curl) -> Self {
        Self { repositories, curl }
    }

    /// The configured repositories.
    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }
}

impl ArtifactResolver for MavenRepoResolver {
    #[instrument(skip(self), fields(artifact = %coordinates.artifact_id, version = %coordinates.version))]
    fn resolves(&self, coordinates: &Coordinates, cross: &CrossVersion) -> ArtifactResult<bool> {
        let path = pom_path(coordinates, cross);
        for repository in &self.repositories {
            let url = format!("{}/{path}", repository.trim_end_matches('/'));
            let status = self
                .curl
                .head(&url)
                .map_err(|source| ArtifactError::Query {
                    repository: repository.clone(),
                    source,
                })?;
            debug!(%url, status, "pom query");
            if (200..300).contains(&status) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
