//! Core library for stagehand.
//!
//! This crate holds the release decisions and the run orchestration used by
//! the `stagehand` CLI: which version a run produces, which module versions
//! it builds against, and which modules need rebuilding.
//!
//! # Modules
//!
//! - [`version`] - Version values, tag parsing and binary versions
//! - [`release`] - Release version selection
//! - [`modules`] - Module identities and version resolution
//! - [`rebuild`] - Rebuild decisions and module build phases
//! - [`run`] - Full release run orchestration
//! - [`config`] - Configuration loading and management
//! - [`settings`] - Run settings resolved from configuration
//! - [`build`], [`sbt`] - Build tool boundary and the sbt adapter
//! - [`git`] - Source control boundary and the git adapter
//! - [`artifacts`], [`staging`], [`cleanup`] - Repository services over HTTP
//!
//! # Quick Start
//!
//! ```no_run
//! use stagehand_core::{ConfigLoader, RunSettings, Toolchain};
//! use stagehand_core::release::select_release_version;
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//! let settings = RunSettings::from_config(&config, camino::Utf8Path::new("."));
//! let toolchain = Toolchain::from_settings(&settings);
//! let services = toolchain.services();
//!
//! let decision = select_release_version(
//!     &settings.version_request,
//!     &settings.root,
//!     services.scm,
//!     services.build,
//! )
//! .expect("version selection failed");
//! println!("{}", decision.version());
//! ```
#![deny(unsafe_code)]

pub mod artifacts;

pub mod build;

pub mod cleanup;

pub mod config;

pub mod error;

pub mod git;

pub mod http;

pub mod modules;

pub mod output;

pub mod properties;

pub mod rebuild;

pub mod release;

pub mod run;

pub mod sbt;

pub mod services;

pub mod settings;

pub mod staging;

pub mod tools;

pub mod version;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use services::{Services, Toolchain};

pub use settings::RunSettings;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
