//! Flat `key=value` property files.
//!
//! Three files in a release run use this format: the version manifest
//! (`versions.properties`), the build-characteristics file the build tool
//! generates (`buildcharacter.properties`), and the run output handed to
//! downstream jobs.
//!
//! Only the subset of the Java properties syntax those files use is
//! supported: one entry per line, `=` or `:` as the separator, `#` and `!`
//! comment lines. Line continuations and escapes are not.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from reading or writing property files.
#[derive(Error, Debug)]
pub enum PropertiesError {
    /// The file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// The file involved.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A non-comment line had no separator.
    #[error("{path}:{line}: expected `key=value`")]
    Syntax {
        /// The file involved.
        path: Utf8PathBuf,
        /// 1-based line number.
        line: usize,
    },
}

/// Result alias for property file operations.
pub type PropertiesResult<T> = Result<T, PropertiesError>;

/// An ordered set of properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a property file.
    #[instrument]
    pub fn load(path: &Utf8Path) -> PropertiesResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PropertiesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let props = Self::parse(&text).map_err(|line| PropertiesError::Syntax {
            path: path.to_path_buf(),
            line,
        })?;
        debug!(count = props.len(), "loaded properties");
        Ok(props)
    }

    /// Parse property text. On failure returns the offending 1-based line.
    pub fn parse(text: &str) -> Result<Self, usize> {
        let mut entries = BTreeMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let Some(sep) = line.find(['=', ':']) else {
                return Err(idx + 1);
            };
            let key = line[..sep].trim();
            if key.is_empty() {
                return Err(idx + 1);
            }
            entries.insert(key.to_string(), line[sep + 1..].trim().to_string());
        }
        Ok(Self { entries })
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as property file text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            let _ = writeln!(out, "{key}={value}");
        }
        out
    }

    /// Write to `path`, replacing any existing file.
    #[instrument(skip(self))]
    pub fn write(&self, path: &Utf8Path) -> PropertiesResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| PropertiesError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, self.render()).map_err(|source| PropertiesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(count = self.len(), "wrote properties");
        Ok(())
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
