//! Nightly version computation.
//!
//! Delegates to the build tool's build-characteristics generator, which
//! writes `buildcharacter.properties` with a version base and a suffix
//! derived from the current commit.

use camino::Utf8Path;
use tracing::{debug, instrument};

use crate::build::{BuildInvocation, BuildTask, BuildTool};
use crate::properties::Properties;
use crate::version::{Version, VersionError, VersionResult};

/// File written by the build-characteristics generator.
pub const BUILD_CHARACTER_FILE: &str = "buildcharacter.properties";

/// Suffix template asking the generator for a commit-based snapshot suffix.
pub const NIGHTLY_SUFFIX_TEMPLATE: &str = "SHA-NIGHTLY";

const BASE_KEY: &str = "maven_version_base";
const SUFFIX_KEY: &str = "maven_version_suffix";

/// Compute the nightly version of the checkout at `root`.
#[instrument(skip(build))]
pub fn nightly_version(build: &dyn BuildTool, root: &Utf8Path) -> VersionResult<Version> {
    let invocation = BuildInvocation::new(root).task(BuildTask::GenerateBuildCharacter {
        suffix_template: NIGHTLY_SUFFIX_TEMPLATE.to_string(),
    });
    build.run(&invocation)?;
    read_build_character(&root.join(BUILD_CHARACTER_FILE))
}

/// Read the version base and suffix from a build-characteristics file.
pub fn read_build_character(path: &Utf8Path) -> VersionResult<Version> {
    let props = Properties::load(path)?;
    let missing = |key| VersionError::MissingBuildCharacter {
        file: path.to_string(),
        key,
    };
    let base = props.get(BASE_KEY).ok_or_else(|| missing(BASE_KEY))?;
    let suffix = props.get(SUFFIX_KEY).ok_or_else(|| missing(SUFFIX_KEY))?;

    let version = Version::from_parts(base, suffix)?;
    debug!(%version, "nightly version from build characteristics");
    Ok(version)
}
