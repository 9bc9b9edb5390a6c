//! Satellite modules built against the compiler.
//!
//! [`ModuleId`] is the closed catalog of modules a release knows about,
//! with everything fixed per module: upstream repository, Maven group and
//! artifact, version manifest key, and tag convention. A [`ModuleSpec`] is
//! one resolved module for one run.

pub mod resolve;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::Coordinates;
use crate::version::Revision;

/// Errors from module resolution.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// A pinned module's release tag does not exist upstream.
    #[error("{module}: tag {tag} does not exist in {repository}")]
    MissingModuleTag {
        /// The module.
        module: ModuleId,
        /// The missing tag.
        tag: String,
        /// Upstream `owner/repo`.
        repository: String,
    },

    /// The version manifest has no entry for a module.
    #[error("{module}: `{key}` not found in version manifest")]
    MissingManifestEntry {
        /// The module.
        module: ModuleId,
        /// The manifest key that was looked up.
        key: &'static str,
    },

    /// A module version or revision was rejected.
    #[error("{module}: invalid {what} `{value}`")]
    InvalidVersion {
        /// The module.
        module: ModuleId,
        /// `"version"` or `"revision"`.
        what: &'static str,
        /// The offending value.
        value: String,
    },

    /// Unknown module name.
    #[error("unknown module `{0}` (expected one of: xml, parser-combinators, swing, partest, scalacheck)")]
    UnknownModule(String),

    /// A git operation failed.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// The version manifest could not be read.
    #[error(transparent)]
    Properties(#[from] crate::properties::PropertiesError),
}

/// Result alias for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// A satellite module.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleId {
    /// XML library.
    Xml,
    /// Parser combinator library.
    ParserCombinators,
    /// Swing bindings.
    Swing,
    /// The compiler's test framework.
    Partest,
    /// Property-based testing library, needed by partest.
    Scalacheck,
}

impl ModuleId {
    /// All modules, in build order.
    pub const ALL: &[Self] = &[
        Self::Xml,
        Self::ParserCombinators,
        Self::Swing,
        Self::Partest,
        Self::Scalacheck,
    ];

    /// Modules built in every run, in build order.
    pub const DEFAULT_ORDER: &[Self] = &[Self::Xml, Self::ParserCombinators, Self::Swing, Self::Partest];

    /// The name used on the command line and in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::ParserCombinators => "parser-combinators",
            Self::Swing => "swing",
            Self::Partest => "partest",
            Self::Scalacheck => "scalacheck",
        }
    }

    /// Upstream GitHub owner.
    pub const fn owner(self) -> &'static str {
        match self {
            Self::Scalacheck => "rickynils",
            _ => "scala",
        }
    }

    /// Upstream GitHub repository.
    pub const fn repo(self) -> &'static str {
        match self {
            Self::Xml => "scala-xml",
            Self::ParserCombinators => "scala-parser-combinators",
            Self::Swing => "scala-swing",
            Self::Partest => "scala-partest",
            Self::Scalacheck => "scalacheck",
        }
    }

    /// Maven group id.
    pub const fn group_id(self) -> &'static str {
        match self {
            Self::Scalacheck => "org.scalacheck",
            _ => "org.scala-lang.modules",
        }
    }

    /// Maven artifact id, before cross-versioning.
    pub const fn artifact_id(self) -> &'static str {
        self.repo()
    }

    /// Key holding this module's version in the version manifest.
    pub const fn manifest_key(self) -> &'static str {
        match self {
            Self::Xml => "scala-xml.version.number",
            Self::ParserCombinators => "scala-parser-combinators.version.number",
            Self::Swing => "scala-swing.version.number",
            Self::Partest => "partest.version.number",
            Self::Scalacheck => "scalacheck.version.number",
        }
    }

    /// Tag pattern for `git describe`; `None` matches any tag.
    pub const fn tag_match(self) -> Option<&'static str> {
        match self {
            Self::Scalacheck => None,
            _ => Some("v*"),
        }
    }

    /// Whether the module is republished to public staging.
    pub const fn publicly_staged(self) -> bool {
        !matches!(self, Self::Scalacheck)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ModuleError::UnknownModule(s.to_string()))
    }
}

/// A module version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleVersion(String);

impl ModuleVersion {
    /// Validate and wrap a module version.
    pub fn new(module: ModuleId, value: impl Into<String>) -> ModuleResult<Self> {
        let value = value.into();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(ModuleError::InvalidVersion {
                module,
                what: "version",
                value,
            });
        }
        Ok(Self(value))
    }

    /// The version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One module as resolved for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSpec {
    id: ModuleId,
    version: ModuleVersion,
    revision: Revision,
    built: bool,
}

impl ModuleSpec {
    /// A module that has not been built in this run.
    pub const fn new(id: ModuleId, version: ModuleVersion, revision: Revision) -> Self {
        Self {
            id,
            version,
            revision,
            built: false,
        }
    }

    /// Which module.
    pub const fn id(&self) -> ModuleId {
        self.id
    }

    /// Resolved version.
    pub const fn version(&self) -> &ModuleVersion {
        &self.version
    }

    /// Revision to build from.
    pub const fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Whether the module was built earlier in this run.
    pub const fn is_built(&self) -> bool {
        self.built
    }

    /// Record that the module was built. There is no way back.
    pub const fn mark_built(&mut self) {
        self.built = true;
    }

    /// Maven coordinates of the module at its resolved version.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            group_id: self.id.group_id().to_string(),
            artifact_id: self.id.artifact_id().to_string(),
            version: self.version.to_string(),
        }
    }
}

/// Resolved modules in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModuleSet(Vec<ModuleSpec>);

impl ModuleSet {
    /// Collect modules, ordering them by build order.
    pub fn new(mut modules: Vec<ModuleSpec>) -> Self {
        modules.sort_by_key(ModuleSpec::id);
        modules.dedup_by_key(|m| m.id());
        Self(modules)
    }

    /// Look up a module.
    pub fn get(&self, id: ModuleId) -> Option<&ModuleSpec> {
        self.0.iter().find(|m| m.id == id)
    }

    /// Modules in build order.
    pub fn iter(&self) -> std::slice::Iter<'_, ModuleSpec> {
        self.0.iter()
    }

    /// Mutable access in build order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ModuleSpec> {
        self.0.iter_mut()
    }

    /// Mark built every module that `later`, a subset of this set taken
    /// for a later phase, has built.
    pub fn absorb_built(&mut self, later: &Self) {
        for spec in &mut self.0 {
            if later.get(spec.id).is_some_and(ModuleSpec::is_built) {
                spec.mark_built();
            }
        }
    }

    /// Keep only modules matching `keep`.
    #[must_use]
    pub fn retain(mut self, keep: impl FnMut(&ModuleSpec) -> bool) -> Self {
        self.0.retain(keep);
        self
    }

    /// Number of modules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ModuleSet {
    type Item = &'a ModuleSpec;
    type IntoIter = std::slice::Iter<'a, ModuleSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: ModuleId, version: &str) -> ModuleSpec {
        ModuleSpec::new(
            id,
            ModuleVersion::new(id, version).unwrap(),
            Revision::tag_for(version),
        )
    }

    #[test]
    fn catalog_metadata() {
        assert_eq!(ModuleId::Xml.owner(), "scala");
        assert_eq!(ModuleId::Xml.group_id(), "org.scala-lang.modules");
        assert_eq!(ModuleId::Partest.manifest_key(), "partest.version.number");
        assert_eq!(ModuleId::Partest.artifact_id(), "scala-partest");
        assert_eq!(ModuleId::Scalacheck.owner(), "rickynils");
        assert_eq!(ModuleId::Scalacheck.group_id(), "org.scalacheck");
        assert_eq!(ModuleId::Scalacheck.tag_match(), None);
        assert_eq!(ModuleId::Swing.tag_match(), Some("v*"));
        assert!(!ModuleId::Scalacheck.publicly_staged());
        assert!(ModuleId::ParserCombinators.publicly_staged());
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("parser-combinators".parse::<ModuleId>().unwrap(), ModuleId::ParserCombinators);
        assert!(matches!("scala-xml".parse::<ModuleId>(), Err(ModuleError::UnknownModule(_))));
        for id in ModuleId::ALL {
            assert_eq!(id.to_string().parse::<ModuleId>().unwrap(), *id);
        }
    }

    #[test]
    fn serde_uses_kebab_case() {
        assert_eq!(serde_json::to_string(&ModuleId::ParserCombinators).unwrap(), "\"parser-combinators\"");
    }

    #[test]
    fn module_version_validation() {
        assert!(ModuleVersion::new(ModuleId::Xml, "").is_err());
        assert!(ModuleVersion::new(ModuleId::Xml, "1.0 6").is_err());
        assert_eq!(ModuleVersion::new(ModuleId::Xml, "1.0.6").unwrap().as_str(), "1.0.6");
    }

    #[test]
    fn set_orders_by_build_order() {
        let set = ModuleSet::new(vec![
            spec(ModuleId::Partest, "1.1.0"),
            spec(ModuleId::Xml, "1.0.6"),
            spec(ModuleId::Scalacheck, "1.13.4"),
            spec(ModuleId::Swing, "2.0.0"),
        ]);
        let order: Vec<ModuleId> = set.iter().map(ModuleSpec::id).collect();
        assert_eq!(
            order,
            vec![ModuleId::Xml, ModuleId::Swing, ModuleId::Partest, ModuleId::Scalacheck]
        );
    }

    #[test]
    fn absorb_built_only_adds_flags() {
        let mut all = ModuleSet::new(vec![
            spec(ModuleId::Xml, "1.0.6"),
            spec(ModuleId::Swing, "2.0.0"),
            spec(ModuleId::Partest, "1.1.0"),
        ]);
        all.iter_mut().filter(|m| m.id() == ModuleId::Partest).for_each(ModuleSpec::mark_built);

        let mut staged = all.clone().retain(|m| m.id() != ModuleId::Partest);
        staged.iter_mut().filter(|m| m.id() == ModuleId::Xml).for_each(ModuleSpec::mark_built);

        all.absorb_built(&staged);
        let built: Vec<ModuleId> = all.iter().filter(|m| m.is_built()).map(ModuleSpec::id).collect();
        assert_eq!(built, vec![ModuleId::Xml, ModuleId::Partest]);
    }

    #[test]
    fn built_flag_is_monotonic() {
        let mut m = spec(ModuleId::Xml, "1.0.6");
        assert!(!m.is_built());
        m.mark_built();
        m.mark_built();
        assert!(m.is_built());
    }

    #[test]
    fn coordinates_from_spec() {
        let c = spec(ModuleId::Scalacheck, "1.13.4").coordinates();
        assert_eq!(c.group_id, "org.scalacheck");
        assert_eq!(c.artifact_id, "scalacheck");
        assert_eq!(c.version, "1.13.4");
    }
}
