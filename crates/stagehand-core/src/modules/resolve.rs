//! Module version and revision resolution.
//!
//! Two strategies, chosen once per run:
//!
//! - **Pinned**: versions come from overrides or the version manifest, and
//!   each module is built from its `v<version>` release tag, which must
//!   exist upstream.
//! - **Nightly**: each module is fetched at an override revision or the
//!   upstream mainline, and its version is derived from `git describe`.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::git::SourceControl;
use crate::modules::{ModuleError, ModuleId, ModuleResult, ModuleSet, ModuleSpec, ModuleVersion};
use crate::properties::Properties;
use crate::version::Revision;

/// How module versions are determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStrategy {
    /// Released versions from the manifest, built from their tags.
    #[default]
    Pinned,
    /// Latest upstream sources, versioned from `git describe`.
    Nightly,
}

/// Per-module override of version and revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleOverride {
    /// Version to use instead of the manifest entry (pinned only).
    pub version: Option<String>,
    /// Revision to build instead of mainline (nightly only).
    pub revision: Option<String>,
}

/// Everything module resolution needs to know.
#[derive(Debug, Clone)]
pub struct ModuleRequest {
    /// Strategy for this run.
    pub strategy: ModuleStrategy,
    /// Modules to resolve.
    pub modules: Vec<ModuleId>,
    /// Per-module overrides.
    pub overrides: BTreeMap<ModuleId, ModuleOverride>,
    /// Where nightly checkouts are placed.
    pub work_dir: Utf8PathBuf,
}

/// Suffix appended to versions derived from `git describe`.
pub const NIGHTLY_VERSION_SUFFIX: &str = "-nightly";

/// Resolve every requested module.
///
/// Pinned resolution checks all tags before returning, so a missing tag
/// fails the run before any build step.
#[instrument(skip_all, fields(strategy = ?request.strategy, count = request.modules.len()))]
pub fn resolve_modules(
    request: &ModuleRequest,
    manifest: &Properties,
    scm: &dyn SourceControl,
) -> ModuleResult<ModuleSet> {
    let mut resolved = Vec::with_capacity(request.modules.len());
    for &id in &request.modules {
        let overrides = request.overrides.get(&id).cloned().unwrap_or_default();
        let spec = match request.strategy {
            ModuleStrategy::Pinned => resolve_pinned(id, &overrides, manifest, scm)?,
            ModuleStrategy::Nightly => resolve_nightly(id, &overrides, &request.work_dir, scm)?,
        };
        info!(
            module = %id,
            version = %spec.version(),
            revision = %spec.revision(),
            "resolved module"
        );
        resolved.push(spec);
    }
    Ok(ModuleSet::new(resolved))
}

fn resolve_pinned(
    id: ModuleId,
    overrides: &ModuleOverride,
    manifest: &Properties,
    scm: &dyn SourceControl,
) -> ModuleResult<ModuleSpec> {
    if let Some(revision) = &overrides.revision {
        warn!(module = %id, %revision, "revision override ignored for pinned modules");
    }

    let raw = match &overrides.version {
        Some(v) => v.as_str(),
        None => manifest
            .get(id.manifest_key())
            .ok_or(ModuleError::MissingManifestEntry {
                module: id,
                key: id.manifest_key(),
            })?,
    };
    let version = ModuleVersion::new(id, raw)?;
    let revision = Revision::tag_for(version.as_str());

    if !scm.remote_tag_exists(id.owner(), id.repo(), revision.as_str())? {
        return Err(ModuleError::MissingModuleTag {
            module: id,
            tag: revision.to_string(),
            repository: format!("{}/{}", id.owner(), id.repo()),
        });
    }

    Ok(ModuleSpec::new(id, version, revision))
}

fn resolve_nightly(
    id: ModuleId,
    overrides: &ModuleOverride,
    work_dir: &Utf8Path,
    scm: &dyn SourceControl,
) -> ModuleResult<ModuleSpec> {
    if let Some(version) = &overrides.version {
        warn!(module = %id, %version, "version override ignored for nightly modules");
    }

    let revision = match &overrides.revision {
        Some(r) => Revision::new(r.as_str()).map_err(|_| ModuleError::InvalidVersion {
            module: id,
            what: "revision",
            value: r.clone(),
        })?,
        None => Revision::mainline(),
    };

    let tree = scm.fetch(id.owner(), id.repo(), &revision, &work_dir.join(id.artifact_id()))?;
    let described = scm.describe(&tree, id.tag_match())?;
    debug!(module = %id, %described, "described checkout");

    let base = described.strip_prefix('v').unwrap_or(&described);
    let version = ModuleVersion::new(id, format!("{base}{NIGHTLY_VERSION_SUFFIX}"))?;
    Ok(ModuleSpec::new(id, version, revision))
}
