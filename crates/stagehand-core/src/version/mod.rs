//! Version values and parsing.
//!
//! A release version is a `major.minor.patch` base plus a free-form suffix
//! (`""`, `-RC1`, `-M2`, `-bin-M1`, `-3a9c2f1-nightly`, ...). The base is
//! held as a [`semver::Version`]; the suffix is kept verbatim so that the
//! full string always round-trips.
//!
//! Submodules cover how a version is obtained: [`explicit`] for caller
//! supplied values, [`nightly`] for snapshot builds, and [`binary`] for the
//! binary compatibility key derived from a version.

pub mod binary;
pub mod explicit;
pub mod nightly;

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub use binary::BinaryVersion;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// A tag did not match `v<major>.<minor>.<patch><suffix>`.
    #[error("could not parse version from tag `{0}`")]
    MalformedTag(String),

    /// A version base or suffix was rejected.
    #[error("invalid version `{value}`: {reason}")]
    InvalidVersion {
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The build-characteristics file lacked a required key.
    #[error("{file} is missing `{key}`")]
    MissingBuildCharacter {
        /// File that was read.
        file: String,
        /// The missing key.
        key: &'static str,
    },

    /// The build tool failed while generating build characteristics.
    #[error(transparent)]
    Build(#[from] crate::build::BuildError),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// A properties file could not be read.
    #[error(transparent)]
    Properties(#[from] crate::properties::PropertiesError),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// A release version: numeric base plus verbatim suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    base: semver::Version,
    suffix: String,
}

impl Version {
    /// Build a version from a base and a suffix, validating the suffix.
    pub fn new(base: semver::Version, suffix: impl Into<String>) -> VersionResult<Self> {
        let suffix = suffix.into();
        if !base.pre.is_empty() || !base.build.is_empty() {
            return Err(VersionError::InvalidVersion {
                value: base.to_string(),
                reason: "base must be plain major.minor.patch",
            });
        }
        validate_suffix(&suffix)?;
        Ok(Self { base, suffix })
    }

    /// Build a version from a textual base (`"2.12.1"`) and suffix (`"-RC1"`).
    pub fn from_parts(base: &str, suffix: &str) -> VersionResult<Self> {
        let invalid = || VersionError::InvalidVersion {
            value: base.to_string(),
            reason: "base must be major.minor.patch",
        };
        let (numbers, rest) = split_base(base).ok_or_else(invalid)?;
        if !rest.is_empty() {
            return Err(invalid());
        }
        Self::new(numbers, suffix)
    }

    /// The numeric base.
    pub const fn base(&self) -> &semver::Version {
        &self.base
    }

    /// The suffix, possibly empty.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// The binary compatibility key for this version.
    pub fn binary_version(&self) -> BinaryVersion {
        BinaryVersion::for_version(self)
    }

    /// The conventional tag for this version (`v` + full version).
    pub fn tag(&self) -> Revision {
        Revision(format!("v{self}"))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.suffix)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A git revision: tag, branch, or commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Validate and wrap a revision.
    pub fn new(value: impl Into<String>) -> VersionResult<Self> {
        let value = value.into();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(VersionError::InvalidVersion {
                value,
                reason: "revision must be non-empty without whitespace",
            });
        }
        Ok(Self(value))
    }

    /// The remote's default branch.
    pub fn mainline() -> Self {
        Self("HEAD".to_string())
    }

    /// The tag conventionally marking `version` (`v<version>`).
    pub fn tag_for(version: &str) -> Self {
        Self(format!("v{version}"))
    }

    /// The revision as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a release tag of the form `v<major>.<minor>.<patch><suffix>`.
///
/// The leading `v` is optional and the suffix is whatever follows the
/// patch number. Anything that does not start with a numeric base is
/// rejected with [`VersionError::MalformedTag`] rather than producing a
/// garbage version. Base numbers with leading zeros are rejected too, since
/// they would not survive the round trip through [`semver::Version`].
pub fn parse_tag(tag: &str) -> VersionResult<Version> {
    let malformed = || VersionError::MalformedTag(tag.to_string());
    let rest = tag.strip_prefix('v').unwrap_or(tag);
    let (base, suffix) = split_base(rest).ok_or_else(malformed)?;
    Version::new(base, suffix).map_err(|_| malformed())
}

/// Split `"2.12.0-M1"` into `(2.12.0, "-M1")`.
fn split_base(s: &str) -> Option<(semver::Version, &str)> {
    let (major, rest) = split_number(s)?;
    let (minor, rest) = split_number(rest.strip_prefix('.')?)?;
    let (patch, rest) = split_number(rest.strip_prefix('.')?)?;
    Some((semver::Version::new(major, minor, patch), rest))
}

/// Split a leading decimal number without leading zeros.
fn split_number(s: &str) -> Option<(u64, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let digits = &s[..end];
    if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    Some((digits.parse().ok()?, &s[end..]))
}

fn validate_suffix(suffix: &str) -> VersionResult<()> {
    if suffix.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(VersionError::InvalidVersion {
            value: suffix.to_string(),
            reason: "suffix must not contain whitespace",
        });
    }
    Ok(())
}
