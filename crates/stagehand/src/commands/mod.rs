//! Command implementations

pub mod doctor;

pub mod info;

pub mod modules;

pub mod release;

pub mod staging;

pub mod version;

use clap::Args;
use stagehand_core::config::{Config, ModulesConfig, ReleaseConfig};
use stagehand_core::modules::ModuleId;
use stagehand_core::modules::resolve::{ModuleOverride, ModuleStrategy};

/// Version selection flags, shared by `version`, `modules`, and `release`.
#[derive(Args, Debug, Default, Clone)]
pub struct VersionArgs {
    /// Release version base (e.g., "2.12.1"); without it the tag on HEAD or a nightly version is used
    #[arg(long, value_name = "VERSION")]
    pub base: Option<String>,

    /// Suffix for --base (e.g., "-RC1"); ignored without --base
    #[arg(long, value_name = "SUFFIX", allow_hyphen_values = true)]
    pub suffix: Option<String>,

    /// Publish to public staging (default for tagged and explicit versions)
    #[arg(long, conflicts_with = "no_publish")]
    pub publish: bool,

    /// Do not publish to public staging
    #[arg(long, conflicts_with = "publish")]
    pub no_publish: bool,
}

impl VersionArgs {
    /// Apply the flags on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        let release = config.release.get_or_insert_with(ReleaseConfig::default);
        if let Some(base) = &self.base {
            release.version_base = Some(base.clone());
        }
        if let Some(suffix) = &self.suffix {
            release.version_suffix = Some(suffix.clone());
        }
        if self.publish {
            release.publish_to_sonatype = Some(true);
        } else if self.no_publish {
            release.publish_to_sonatype = Some(false);
        }
    }
}

/// Module resolution flags, shared by `modules` and `release`.
#[derive(Args, Debug, Default, Clone)]
pub struct ModuleArgs {
    /// Build modules from upstream mainline instead of released tags
    #[arg(long)]
    pub nightly_modules: bool,

    /// Pin a module version (repeatable), e.g. xml=1.0.6
    #[arg(long = "module-version", value_name = "MODULE=VERSION", value_parser = parse_override)]
    pub module_versions: Vec<(ModuleId, String)>,

    /// Build a module from a revision (repeatable; nightly modules only), e.g. swing=2.0.x
    #[arg(long = "module-revision", value_name = "MODULE=REV", value_parser = parse_override)]
    pub module_revisions: Vec<(ModuleId, String)>,

    /// Also build scalacheck in the internal phase
    #[arg(long)]
    pub build_scalacheck: bool,
}

impl ModuleArgs {
    /// Apply the flags on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        let modules = config.modules.get_or_insert_with(ModulesConfig::default);
        if self.nightly_modules {
            modules.strategy = Some(ModuleStrategy::Nightly);
        }
        if self.build_scalacheck {
            modules.build_scalacheck = Some(true);
        }
        if self.module_versions.is_empty() && self.module_revisions.is_empty() {
            return;
        }
        let overrides = modules.overrides.get_or_insert_with(Default::default);
        for (id, version) in &self.module_versions {
            overrides.entry(*id).or_insert_with(ModuleOverride::default).version = Some(version.clone());
        }
        for (id, revision) in &self.module_revisions {
            overrides.entry(*id).or_insert_with(ModuleOverride::default).revision = Some(revision.clone());
        }
    }
}

/// Parse `module=value`.
fn parse_override(s: &str) -> Result<(ModuleId, String), String> {
    let (module, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected MODULE=VALUE, got `{s}`"))?;
    let id = module.trim().parse::<ModuleId>().map_err(|e| e.to_string())?;
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("empty value for {id}"));
    }
    Ok((id, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_override_accepts_module_names() {
        assert_eq!(
            parse_override("parser-combinators=1.0.5").unwrap(),
            (ModuleId::ParserCombinators, "1.0.5".to_string())
        );
        assert!(parse_override("xml").is_err());
        assert!(parse_override("nope=1.0").is_err());
        assert!(parse_override("xml=").is_err());
    }

    #[test]
    fn version_args_override_config() {
        let mut config = Config::default();
        VersionArgs {
            base: Some("2.12.1".into()),
            suffix: Some("-RC1".into()),
            no_publish: true,
            ..VersionArgs::default()
        }
        .apply(&mut config);
        let release = config.release.unwrap();
        assert_eq!(release.version_base.as_deref(), Some("2.12.1"));
        assert_eq!(release.version_suffix.as_deref(), Some("-RC1"));
        assert_eq!(release.publish_to_sonatype, Some(false));
    }

    #[test]
    fn module_args_merge_overrides() {
        let mut config = Config::default();
        ModuleArgs {
            nightly_modules: true,
            module_versions: vec![(ModuleId::Xml, "1.0.7".into())],
            module_revisions: vec![(ModuleId::Xml, "main".into())],
            build_scalacheck: false,
        }
        .apply(&mut config);
        let modules = config.modules.unwrap();
        assert_eq!(modules.strategy, Some(ModuleStrategy::Nightly));
        let xml = &modules.overrides.unwrap()[&ModuleId::Xml];
        assert_eq!(xml.version.as_deref(), Some("1.0.7"));
        assert_eq!(xml.revision.as_deref(), Some("main"));
    }
}
