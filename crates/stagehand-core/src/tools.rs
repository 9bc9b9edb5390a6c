//! External tool availability.
//!
//! A release shells out to `git`, `curl` and the build tool. `doctor`
//! reports whether each is on `PATH` and, where it is cheap to ask, which
//! version is installed.

use std::process::Command;

use serde::Serialize;
use tracing::{debug, instrument};

/// Availability of one external tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    /// Executable name as configured.
    pub name: String,
    /// Resolved path, if found on `PATH`.
    pub path: Option<String>,
    /// First line of `--version` output, if found.
    pub version: Option<String>,
}

impl ToolStatus {
    /// Whether the tool was found.
    pub const fn found(&self) -> bool {
        self.path.is_some()
    }
}

/// Check whether a binary is available on `PATH`.
pub fn has_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Check `git`, `curl`, and the configured build tool.
///
/// The build tool is only located, not started: sbt boots a JVM to answer
/// `--version`.
#[instrument]
pub fn check_tools(build_command: &str) -> Vec<ToolStatus> {
    vec![
        inspect("git", true),
        inspect("curl", true),
        inspect(build_command, false),
    ]
}

fn inspect(name: &str, ask_version: bool) -> ToolStatus {
    let path = which::which(name).ok().map(|p| p.display().to_string());
    let version = if ask_version && path.is_some() {
        version_line(name)
    } else {
        None
    };
    debug!(name, ?path, ?version, "checked tool");
    ToolStatus {
        name: name.to_string(),
        path,
        version,
    }
}

fn version_line(binary: &str) -> Option<String> {
    let output = Command::new(binary).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    first_line(&String::from_utf8_lossy(&output.stdout))
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_not_found() {
        let status = inspect("definitely-not-installed-xyz", true);
        assert!(!status.found());
        assert!(status.version.is_none());
    }

    #[test]
    fn checks_three_tools_in_order() {
        let names: Vec<String> = check_tools("my-sbt").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["git", "curl", "my-sbt"]);
    }

    #[test]
    fn first_line_skips_blanks() {
        assert_eq!(first_line("\n  git version 2.43.0\nextra"), Some("git version 2.43.0".into()));
        assert_eq!(first_line(""), None);
    }
}
