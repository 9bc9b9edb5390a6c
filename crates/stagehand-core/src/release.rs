//! Release version selection.
//!
//! Exactly one of three sources decides the version of a run:
//!
//! 1. **Explicit**: the caller supplied a version base (and maybe a suffix).
//! 2. **Tagged**: `HEAD` of the compiler checkout carries a tag.
//! 3. **Nightly**: neither; the build tool derives a snapshot version.
//!
//! The result is a [`ReleaseDecision`], built once and never changed.

use std::fmt;

use camino::Utf8Path;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{info, instrument, warn};

use crate::build::BuildTool;
use crate::git::SourceControl;
use crate::version::explicit::validate_explicit;
use crate::version::nightly::nightly_version;
use crate::version::{BinaryVersion, Revision, Version, VersionResult, parse_tag};

/// Where the release version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// Caller-supplied base and suffix.
    Explicit,
    /// Exact tag on `HEAD`.
    Tagged,
    /// Build-characteristics snapshot.
    Nightly,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Tagged => write!(f, "tagged"),
            Self::Nightly => write!(f, "nightly"),
        }
    }
}

/// Caller inputs to version selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRequest {
    /// Explicit version base (`2.12.1`).
    pub base: Option<String>,
    /// Suffix for the explicit base (`-RC1`). Ignored without a base.
    pub suffix: Option<String>,
    /// Override for publishing to public staging.
    pub publish_override: Option<bool>,
}

/// The settled release version of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDecision {
    version: Version,
    binary_version: BinaryVersion,
    publish_to_sonatype: bool,
    scaladoc_revision: Revision,
    source: VersionSource,
}

impl ReleaseDecision {
    fn new(
        version: Version,
        publish_to_sonatype: bool,
        scaladoc_revision: Revision,
        source: VersionSource,
    ) -> Self {
        let binary_version = version.binary_version();
        Self {
            version,
            binary_version,
            publish_to_sonatype,
            scaladoc_revision,
            source,
        }
    }

    /// The full release version.
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// The binary compatibility key.
    pub const fn binary_version(&self) -> &BinaryVersion {
        &self.binary_version
    }

    /// Whether the run stages to the public release system.
    pub const fn publish_to_sonatype(&self) -> bool {
        self.publish_to_sonatype
    }

    /// Revision that API documentation links point at.
    pub const fn scaladoc_revision(&self) -> &Revision {
        &self.scaladoc_revision
    }

    /// Which path produced the version.
    pub const fn source(&self) -> VersionSource {
        self.source
    }
}

impl Serialize for ReleaseDecision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ReleaseDecision", 7)?;
        s.serialize_field("version", &self.version)?;
        s.serialize_field("version_base", &self.version.base().to_string())?;
        s.serialize_field("version_suffix", self.version.suffix())?;
        s.serialize_field("binary_version", &self.binary_version)?;
        s.serialize_field("publish_to_sonatype", &self.publish_to_sonatype)?;
        s.serialize_field("scaladoc_revision", &self.scaladoc_revision)?;
        s.serialize_field("source", &self.source)?;
        s.end()
    }
}

/// Decide the release version for the compiler checkout at `root`.
#[instrument(skip(scm, build))]
pub fn select_release_version(
    request: &VersionRequest,
    root: &Utf8Path,
    scm: &dyn SourceControl,
    build: &dyn BuildTool,
) -> VersionResult<ReleaseDecision> {
    let decision = if let Some(base) = &request.base {
        let version = validate_explicit(base, request.suffix.as_deref())?;
        let revision = version.tag();
        ReleaseDecision::new(
            version,
            request.publish_override.unwrap_or(true),
            revision,
            VersionSource::Explicit,
        )
    } else {
        if let Some(suffix) = &request.suffix {
            warn!(%suffix, "version suffix given without a base; ignoring");
        }

        if let Some(tag) = scm.exact_tag_at(root)? {
            let version = parse_tag(&tag)?;
            ReleaseDecision::new(
                version,
                request.publish_override.unwrap_or(true),
                Revision::new(tag)?,
                VersionSource::Tagged,
            )
        } else {
            if request.publish_override == Some(true) {
                warn!("nightly builds are never published to public staging; ignoring override");
            }
            let version = nightly_version(build, root)?;
            let head = scm.head_commit(root)?;
            ReleaseDecision::new(version, false, head, VersionSource::Nightly)
        }
    };

    info!(
        version = %decision.version,
        binary_version = %decision.binary_version,
        publish = decision.publish_to_sonatype,
        source = %decision.source,
        "release version selected"
    );
    Ok(decision)
}
