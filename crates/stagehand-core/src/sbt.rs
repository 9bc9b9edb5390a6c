//! sbt adapter for [`BuildTool`].
//!
//! Every sbt-specific string in the crate lives here: `-D` properties,
//! `set every ...` commands, task names, and the `setupBootstrap*` commands
//! the compiler build defines.

use std::process::Command;

use tracing::{debug, instrument, trace};

use crate::build::{
    BootstrapStage, BuildError, BuildInvocation, BuildResult, BuildTask, BuildTool, PublishTarget,
    Setting,
};
use crate::version::Version;

/// Lines of stderr kept in a [`BuildError::Failed`].
const STDERR_TAIL_LINES: usize = 20;

/// Runs builds with sbt.
#[derive(Debug, Clone)]
pub struct SbtTool {
    command: String,
    args: Vec<String>,
}

impl SbtTool {
    /// Create an adapter running `command` with extra leading `args`.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Render the full argument list for an invocation.
    pub fn arguments(&self, invocation: &BuildInvocation) -> Vec<String> {
        let mut out = vec!["-no-colors".to_string()];
        out.extend(self.args.iter().cloned());
        for (key, value) in &invocation.properties {
            out.push(format!("-D{key}={value}"));
        }
        for setting in &invocation.settings {
            out.push(render_setting(setting));
        }
        for task in &invocation.tasks {
            out.extend(render_task(task));
        }
        out
    }
}

impl Default for SbtTool {
    fn default() -> Self {
        Self::new("sbt", Vec::new())
    }
}

impl BuildTool for SbtTool {
    #[instrument(skip_all, fields(dir = %invocation.dir, tasks = invocation.tasks.len()))]
    fn run(&self, invocation: &BuildInvocation) -> BuildResult<()> {
        let args = self.arguments(invocation);
        debug!(command = %self.command, ?args, "running sbt");

        let output = Command::new(&self.command)
            .args(&args)
            .current_dir(invocation.dir.as_std_path())
            .output()
            .map_err(|source| BuildError::Exec {
                tool: self.command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            trace!(target: "stagehand::sbt", "{line}");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::Failed {
                tool: self.command.clone(),
                dir: invocation.dir.clone(),
                exit_code: output.status.code(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }
        Ok(())
    }

    fn dist_version_override(&self, version: &Version) -> String {
        format!("-Dproject.version={version}")
    }
}

fn render_setting(setting: &Setting) -> String {
    match setting {
        Setting::Version(v) => format!(r#"set every version := "{v}""#),
        Setting::ScalaVersion(v) => format!(r#"set every scalaVersion := "{v}""#),
        Setting::Resolver(url) => format!(r#"set every resolvers += "private-repo" at "{url}""#),
    }
}

fn render_task(task: &BuildTask) -> Vec<String> {
    match task {
        BuildTask::Clean => vec!["clean".into()],
        BuildTask::Test => vec!["test".into()],
        BuildTask::Doc => vec!["doc".into()],
        BuildTask::Publish(PublishTarget::Configured) => vec!["publish".into()],
        BuildTask::Publish(PublishTarget::Repository(url)) => vec![
            format!(r#"set every publishTo := Some("private-repo" at "{url}")"#),
            "publish".into(),
        ],
        BuildTask::Publish(PublishTarget::Staging) => vec!["publishSigned".into()],
        BuildTask::GenerateBuildCharacter { suffix_template } => vec![
            format!(r#"set baseVersionSuffix in Global := "{suffix_template}""#),
            "generateBuildCharacterPropertiesFile".into(),
        ],
        BuildTask::SetupBootstrap {
            stage,
            repository,
            version,
        } => {
            let command = match stage {
                BootstrapStage::Starr => "setupBootstrapStarr",
                BootstrapStage::Quick => "setupBootstrapQuick",
                BootstrapStage::Publish => "setupBootstrapPublish",
            };
            vec![format!("{command} {repository} {version}")]
        }
        BuildTask::Compile(project) => vec![format!("{project}/compile")],
        BuildTask::MakeQuick => vec!["dist/mkQuick".into()],
        BuildTask::Custom(name) => vec![name.clone()],
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
