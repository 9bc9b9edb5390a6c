//! Binary compatibility version.
//!
//! Published module artifacts are namespaced by the compiler's binary
//! version (`scala-xml_2.12`). Pre-releases of a `.0` line are not binary
//! compatible with each other or with the final release, so they are keyed
//! by their full version instead (`scala-xml_2.12.0-M1`).

use std::fmt;

use serde::Serialize;

use crate::version::Version;

/// The key under which binary-compatible artifacts are published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BinaryVersion(String);

impl BinaryVersion {
    /// Compute the binary version from a full version and its parts.
    ///
    /// `major.minor` when the suffix is empty, starts with `-bin`, or the
    /// patch is non-zero; otherwise the full version unchanged.
    pub fn resolve(full: &str, base: &semver::Version, suffix: &str) -> Self {
        let major_minor = format!("{}.{}", base.major, base.minor);
        if suffix.is_empty() || suffix.starts_with("-bin") || base.patch != 0 {
            Self(major_minor)
        } else {
            Self(full.to_string())
        }
    }

    /// Binary version of a parsed [`Version`].
    pub fn for_version(version: &Version) -> Self {
        Self::resolve(&version.to_string(), version.base(), version.suffix())
    }

    /// The binary version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
