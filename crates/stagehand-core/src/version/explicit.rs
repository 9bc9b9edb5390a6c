//! Explicit version mode: validate a caller-supplied base and suffix.

use tracing::{debug, instrument};

use crate::version::{Version, VersionResult};

/// Validate an explicit version base (`"2.12.1"`) and optional suffix.
///
/// The base may carry a `v` prefix. A missing suffix means a plain release.
#[instrument]
pub fn validate_explicit(base: &str, suffix: Option<&str>) -> VersionResult<Version> {
    let base = base.strip_prefix('v').unwrap_or(base);
    let version = Version::from_parts(base, suffix.unwrap_or(""))?;
    debug!(%version, "validated explicit version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_explicit() {
        assert_eq!(validate_explicit("2.12.1", None).unwrap().to_string(), "2.12.1");
    }

    #[test]
    fn valid_with_prefix_and_suffix() {
        let v = validate_explicit("v2.12.0", Some("-RC1")).unwrap();
        assert_eq!(v.base().to_string(), "2.12.0");
        assert_eq!(v.suffix(), "-RC1");
    }

    #[test]
    fn invalid_explicit() {
        assert!(validate_explicit("not-a-version", None).is_err());
        assert!(validate_explicit("2.12", None).is_err());
    }
}
