//! Configuration loading and discovery.
//!
//! Sources are merged in this order, later ones winning:
//! 1. Built-in defaults
//! 2. User config in the XDG config directory
//! 3. Project config, found by walking up from the working directory
//! 4. Explicit files passed with `--config`
//! 5. `STAGEHAND_*` environment variables, `__` separating sections
//!    (`STAGEHAND_RELEASE__VERSION_BASE=2.12.1`)
//!
//! # Supported formats
//!
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.stagehand.<ext>` in current directory or any parent
//! - `stagehand.<ext>` in current directory or any parent
//! - `~/.config/stagehand/config.<ext>` (user config)
//!
//! Every section is optional. Unset values are filled in by
//! [`RunSettings`](crate::settings::RunSettings).
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use stagehand_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::modules::ModuleId;
use crate::modules::resolve::{ModuleOverride, ModuleStrategy};

/// The configuration for stagehand.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Release version and run behavior.
    pub release: Option<ReleaseConfig>,
    /// Module resolution.
    pub modules: Option<ModulesConfig>,
    /// Build tool invocation.
    pub build: Option<BuildConfig>,
    /// Maven repositories.
    pub repositories: Option<RepositoriesConfig>,
    /// Public staging system.
    pub staging: Option<StagingConfig>,
}

/// Release version and run behavior.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Explicit version base (`"2.12.1"`). Unset means tagged or nightly.
    pub version_base: Option<String>,
    /// Suffix for the explicit base (`"-RC1"`).
    pub version_suffix: Option<String>,
    /// Override whether to stage publicly. Never honoured for nightlies.
    pub publish_to_sonatype: Option<bool>,
    /// Build every module even when already published.
    pub force_rebuild: Option<bool>,
    /// Run the bootstrap stability test after the quick build.
    pub test_stability: Option<bool>,
    /// Where the run output properties are written (default: `release.properties`).
    pub output_file: Option<Utf8PathBuf>,
    /// Compiler version that builds the locker (default: the build's own choice).
    pub starr_version: Option<String>,
    /// Script comparing `build/quick` and `build/strap` (default: `tools/stability-test.sh`).
    pub stability_script: Option<Utf8PathBuf>,
    /// Prompt for confirmation before a release run (default: true).
    ///
    /// The `--yes`/`-y` CLI flag overrides this at runtime.
    pub confirm: Option<bool>,
}

/// Module resolution.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModulesConfig {
    /// `"pinned"` (default) or `"nightly"`.
    pub strategy: Option<ModuleStrategy>,
    /// Version manifest (default: `versions.properties`).
    pub manifest: Option<Utf8PathBuf>,
    /// Where module checkouts go (default: `target/modules`).
    pub work_dir: Option<Utf8PathBuf>,
    /// Also build the property-testing library (default: false).
    pub build_scalacheck: Option<bool>,
    /// Per-module version or revision overrides.
    ///
    /// ```toml
    /// [modules.overrides.xml]
    /// version = "1.0.7"
    /// ```
    pub overrides: Option<BTreeMap<ModuleId, ModuleOverride>>,
}

/// Build tool invocation.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BuildConfig {
    /// Build tool executable (default: `sbt`).
    pub command: Option<String>,
    /// Extra leading arguments for every invocation.
    pub args: Option<Vec<String>>,
    /// Run `clean` before builds (default: true).
    pub clean: Option<bool>,
    /// Extra tasks for the quick build, before packaging.
    pub quick_tasks: Option<Vec<String>>,
    /// Extra system properties for the quick build.
    pub properties: Option<BTreeMap<String, String>>,
}

/// Maven repositories.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RepositoriesConfig {
    /// Integration repository that locker and internal modules go to.
    pub integration: Option<String>,
    /// Repositories queried for already-published modules
    /// (default: Maven Central). The integration repository is always queried first.
    pub resolvers: Option<Vec<String>>,
    /// Group path cleaned before a run (default: `org/scala-lang`).
    pub cleanup_group: Option<String>,
}

/// Public staging system.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StagingConfig {
    /// Staging REST API root (default: `https://oss.sonatype.org/service/local`).
    pub url: Option<String>,
    /// Staging profile name (default: `org.scala-lang`).
    pub profile: Option<String>,
    /// netrc file with staging credentials (default: curl's own lookup).
    pub netrc: Option<Utf8PathBuf>,
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "stagehand";

/// Prefix of environment variables that override config values.
const ENV_PREFIX: &str = "STAGEHAND_";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
    /// Prefix of environment overrides; `None` disables them.
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/stagehand/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Skip `STAGEHAND_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. `STAGEHAND_*` environment variables
    /// 2. Explicit files (in order added via `with_file`), which must exist
    /// 3. Project config (closest to search root)
    /// 4. User config (`~/.config/stagehand/config.<ext>`)
    /// 5. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Start with user config (lowest precedence of file sources)
        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        // Add project config
        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        // Explicit files must exist
        for file in &self.explicit_files {
            if !file.is_file() {
                return Err(ConfigError::MissingFile(file.clone()));
            }
            figment = Self::merge_file(figment, file);
        }

        if let Some(ref prefix) = self.env_prefix {
            figment = figment.merge(
                Env::prefixed(prefix)
                    .split("__")
                    .ignore(&["log_path"]),
            );
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            strategy = ?config.modules.as_ref().and_then(|m| m.strategy),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            // Check for boundary marker
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    // Found boundary in a parent dir, stop searching
                    break;
                }
            }

            // Check for config files in this directory (try each extension)
            for ext in CONFIG_EXTENSIONS {
                // Try dotfile first (.stagehand.toml)
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                // Then try regular name (stagehand.toml)
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
        let config_dir = proj_dirs.config_dir();

        // Try each supported extension
        for ext in CONFIG_EXTENSIONS {
            let config_path = config_dir.join(format!("config.{ext}"));
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("toml") => figment.merge(Toml::file_exact(path.as_str())),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
///
/// Useful for commands that need to know where config is located.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

/// Get the project directories for XDG-compliant path resolution.
///
/// Returns `None` if the home directory cannot be determined.
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/stagehand/` on Linux, `~/Library/Application Support/stagehand/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the user cache directory path.
///
/// Returns `~/.cache/stagehand/` on Linux, `~/Library/Caches/stagehand/`
/// on macOS, and equivalent on other platforms.
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.cache_dir().to_path_buf()).ok()
}

/// Get the user data directory path.
///
/// Returns `~/.local/share/stagehand/` on Linux, `~/Library/Application Support/stagehand/`
/// on macOS, and equivalent on other platforms.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
///
/// Returns `~/.local/share/stagehand/` on Linux, `~/Library/Application Support/stagehand/`
/// on macOS, and equivalent on other platforms.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn load_toml(body: &str) -> Config {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, body).unwrap();
        let config_path = Utf8PathBuf::try_from(config_path).unwrap();
        ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.release.is_none());
        assert!(config.modules.is_none());
        assert!(config.staging.is_none());
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_single_file_overrides_default() {
        let config = load_toml(
            r#"log_level = "debug"
log_dir = "/tmp/stagehand"
"#,
        );
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.log_dir.as_ref().map(|dir| dir.as_str()),
            Some("/tmp/stagehand")
        );
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();

        let base_config = tmp.path().join("base.toml");
        fs::write(&base_config, "[release]\nversion_base = \"2.12.0\"\nforce_rebuild = true\n").unwrap();

        let override_config = tmp.path().join("override.yaml");
        fs::write(&override_config, "release:\n  version_base: \"2.12.1\"\n").unwrap();

        let base_config = Utf8PathBuf::try_from(base_config).unwrap();
        let override_config = Utf8PathBuf::try_from(override_config).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base_config)
            .with_file(&override_config)
            .load()
            .unwrap();

        let release = config.release.unwrap();
        assert_eq!(release.version_base.as_deref(), Some("2.12.1"));
        assert_eq!(release.force_rebuild, Some(true));
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("src").join("deep");
        fs::create_dir_all(&sub_dir).unwrap();

        fs::write(project_dir.join(".stagehand.toml"), r#"log_level = "debug""#).unwrap();

        let sub_dir = Utf8PathBuf::try_from(sub_dir).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(&sub_dir)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();

        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();

        fs::write(parent.join(".stagehand.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let work = Utf8PathBuf::try_from(work).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(&work)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_explicit_file_overrides_project_config() {
        let tmp = TempDir::new().unwrap();

        fs::write(tmp.path().join("stagehand.toml"), r#"log_level = "warn""#).unwrap();
        let override_config = tmp.path().join("override.json");
        fs::write(&override_config, r#"{"log_level": "error"}"#).unwrap();

        let tmp_path = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let override_config = Utf8PathBuf::try_from(override_config).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(&tmp_path)
            .with_file(&override_config)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn test_load_or_error_fails_when_no_config() {
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load_or_error();

        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("stagehand"));
        }
    }

    #[test]
    fn test_config_with_release_section() {
        let config = load_toml(
            r#"
[release]
version_base = "2.12.0"
version_suffix = "-RC1"
publish_to_sonatype = false
test_stability = true
output_file = "jenkins.properties"
confirm = false
"#,
        );
        let release = config.release.unwrap();
        assert_eq!(release.version_base.as_deref(), Some("2.12.0"));
        assert_eq!(release.version_suffix.as_deref(), Some("-RC1"));
        assert_eq!(release.publish_to_sonatype, Some(false));
        assert_eq!(release.test_stability, Some(true));
        assert_eq!(release.output_file.as_deref(), Some(Utf8Path::new("jenkins.properties")));
        assert_eq!(release.confirm, Some(false));
        assert!(release.force_rebuild.is_none());
    }

    #[test]
    fn test_config_with_modules_section() {
        let config = load_toml(
            r#"
[modules]
strategy = "nightly"
build_scalacheck = true

[modules.overrides.xml]
revision = "1.0.x"

[modules.overrides.parser-combinators]
version = "1.0.5"
"#,
        );
        let modules = config.modules.unwrap();
        assert_eq!(modules.strategy, Some(ModuleStrategy::Nightly));
        assert_eq!(modules.build_scalacheck, Some(true));

        let overrides = modules.overrides.unwrap();
        assert_eq!(overrides[&ModuleId::Xml].revision.as_deref(), Some("1.0.x"));
        assert_eq!(overrides[&ModuleId::Xml].version, None);
        assert_eq!(
            overrides[&ModuleId::ParserCombinators].version.as_deref(),
            Some("1.0.5")
        );
    }

    #[test]
    fn test_config_with_build_and_repositories() {
        let config = load_toml(
            r#"
[build]
command = "/opt/sbt/bin/sbt"
args = ["-J-Xmx2G"]
clean = false
quick_tasks = ["generateBuildCharacterPropertiesFile"]

[build.properties]
"scala.build.publishDevelocity" = "false"

[repositories]
integration = "https://scala-ci.typesafe.com/artifactory/scala-integration/"
resolvers = ["https://repo1.maven.org/maven2/"]
"#,
        );
        let build = config.build.unwrap();
        assert_eq!(build.command.as_deref(), Some("/opt/sbt/bin/sbt"));
        assert_eq!(build.clean, Some(false));
        assert_eq!(build.properties.unwrap().len(), 1);

        let repos = config.repositories.unwrap();
        assert!(repos.integration.unwrap().contains("artifactory"));
        assert_eq!(repos.resolvers.unwrap().len(), 1);
        assert!(repos.cleanup_group.is_none());
    }

    #[test]
    fn test_config_with_staging_section() {
        let config = load_toml(
            r#"
[staging]
profile = "org.example"
netrc = "/secrets/sonatype.netrc"
"#,
        );
        let staging = config.staging.unwrap();
        assert_eq!(staging.profile.as_deref(), Some("org.example"));
        assert!(staging.url.is_none());
        assert_eq!(staging.netrc.as_deref(), Some(Utf8Path::new("/secrets/sonatype.netrc")));
    }

    #[test]
    fn test_unknown_module_override_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[modules.overrides.scala-xml]\nversion = \"1.0.6\"\n").unwrap();
        let config_path = Utf8PathBuf::try_from(config_path).unwrap();

        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = Utf8PathBuf::try_from(tmp.path().join("nope.toml")).unwrap();

        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_env()
            .with_file(&missing)
            .load();
        assert!(matches!(result, Err(ConfigError::MissingFile(path)) if path == missing));
    }
}
