//! Run output file.
//!
//! Downstream jobs (distribution packaging, documentation publishing) read
//! the settled version from a small properties file written right after
//! version selection.

use camino::Utf8Path;
use tracing::{info, instrument};

use crate::build::BuildTool;
use crate::properties::{Properties, PropertiesResult};
use crate::release::ReleaseDecision;

/// Key holding the full release version.
pub const VERSION_KEY: &str = "version";
/// Key holding the build tool option that pins the distribution version.
pub const DIST_OVERRIDE_KEY: &str = "sbtDistVersionOverride";

/// The output entries for a decision.
pub fn run_output(decision: &ReleaseDecision, build: &dyn BuildTool) -> Properties {
    [
        (VERSION_KEY.to_string(), decision.version().to_string()),
        (
            DIST_OVERRIDE_KEY.to_string(),
            build.dist_version_override(decision.version()),
        ),
    ]
    .into_iter()
    .collect()
}

/// Write the output entries for a decision to `path`.
#[instrument(skip(decision, build))]
pub fn write_run_output(
    path: &Utf8Path,
    decision: &ReleaseDecision,
    build: &dyn BuildTool,
) -> PropertiesResult<()> {
    run_output(decision, build).write(path)?;
    info!(%path, version = %decision.version(), "wrote run output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::{FakeBuild, explicit_decision};

    #[test]
    fn output_entries() {
        let props = run_output(&explicit_decision("2.12.0", "-RC1"), &FakeBuild::default());
        assert_eq!(props.get("version"), Some("2.12.0-RC1"));
        assert_eq!(props.get("sbtDistVersionOverride"), Some("-Dproject.version=2.12.0-RC1"));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn writes_file_creating_parent() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("out").join("release.properties")).unwrap();
        write_run_output(&path, &explicit_decision("2.12.1", ""), &FakeBuild::default()).unwrap();

        let written = Properties::load(&path).unwrap();
        assert_eq!(written.get("version"), Some("2.12.1"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "sbtDistVersionOverride=-Dproject.version=2.12.1\nversion=2.12.1\n"
        );
    }
}
