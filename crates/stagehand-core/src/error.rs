//! Error types.
//!
//! Each component owns its error enum next to the code that raises it.
//! Configuration errors live here; the rest are re-exported so callers can
//! match on any of them from one place. [`RunError`] wraps them all.

use camino::Utf8PathBuf;
use thiserror::Error;

pub use crate::artifacts::ArtifactError;
pub use crate::build::BuildError;
pub use crate::cleanup::CleanupError;
pub use crate::git::GitError;
pub use crate::http::HttpError;
pub use crate::modules::ModuleError;
pub use crate::properties::PropertiesError;
pub use crate::rebuild::RebuildError;
pub use crate::run::RunError;
pub use crate::staging::StagingError;
pub use crate::version::VersionError;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A config source could not be merged or deserialized.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// An explicit `--config` file does not exist.
    #[error("config file not found: {0}")]
    MissingFile(Utf8PathBuf),

    /// No config file in any searched location.
    #[error("no configuration file found")]
    NotFound,
}

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
