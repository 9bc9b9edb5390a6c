//! Logging for a release run.
//!
//! Every event lands in a JSONL file. The `spans` list on each line carries
//! the run context: the `execute` span with the release version, the current
//! `phase`, and the `module` being built. Warnings are echoed to stderr for
//! the operator. stdout stays reserved for command output.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const SERVICE: &str = env!("CARGO_PKG_NAME");
const ENV_LOG_PATH: &str = "STAGEHAND_LOG_PATH";
const ENV_LOG_DIR: &str = "STAGEHAND_LOG_DIR";

/// Log levels picked with `-q` and `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verbosity {
    quiet: bool,
    verbose: u8,
}

impl Verbosity {
    /// From the `--quiet` flag and the `-v` count.
    pub const fn new(quiet: bool, verbose: u8) -> Self {
        Self { quiet, verbose }
    }

    /// Filter for the log file. Flags win over `RUST_LOG`, which wins over
    /// the configured level.
    pub fn file_filter(self, configured: &str) -> EnvFilter {
        match (self.quiet, self.verbose) {
            (true, _) => EnvFilter::new("error"),
            (false, 0) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured)),
            (false, 1) => EnvFilter::new("debug"),
            (false, _) => EnvFilter::new("trace"),
        }
    }

    /// Level echoed to stderr: warnings by default, one step more per `-v`.
    pub const fn stderr_level(self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::ERROR,
            (false, 0) => LevelFilter::WARN,
            (false, 1) => LevelFilter::INFO,
            (false, _) => LevelFilter::DEBUG,
        }
    }
}

/// Keeps the background log writer alive. Drop it last so buffered lines
/// are flushed.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Where the JSONL log goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// One fixed file, never rotated.
    File(PathBuf),
    /// `stagehand.<date>.jsonl`, rotated daily.
    Dir(PathBuf),
}

impl LogTarget {
    /// Targets to try, best first. An explicit file or directory is the only
    /// candidate; otherwise the per-user data dir, then `./target`.
    fn candidates(file: Option<PathBuf>, dir: Option<PathBuf>, configured: Option<PathBuf>) -> Vec<Self> {
        if let Some(file) = file {
            return vec![Self::File(file)];
        }
        if let Some(dir) = dir.or(configured) {
            return vec![Self::Dir(dir)];
        }
        directories::ProjectDirs::from("", "", SERVICE)
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .into_iter()
            .chain(std::env::current_dir().ok().map(|cwd| cwd.join("target")))
            .map(Self::Dir)
            .collect()
    }

    /// Open the appender, creating directories as needed.
    fn open(&self) -> Result<RollingFileAppender, InitError> {
        let builder = RollingFileAppender::builder();
        match self {
            Self::File(path) => {
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let name = path
                    .file_name()
                    .map_or_else(|| format!("{SERVICE}.jsonl"), |n| n.to_string_lossy().into_owned());
                builder.rotation(Rotation::NEVER).filename_prefix(name).build(dir)
            }
            Self::Dir(dir) => builder
                .rotation(Rotation::DAILY)
                .filename_prefix(SERVICE)
                .filename_suffix("jsonl")
                .build(dir),
        }
    }
}

/// First target from the environment, config, or defaults that opens.
fn open_log(configured: Option<&Path>) -> Option<(LogTarget, RollingFileAppender)> {
    let file = std::env::var_os(ENV_LOG_PATH).map(PathBuf::from);
    let dir = std::env::var_os(ENV_LOG_DIR).map(PathBuf::from);
    LogTarget::candidates(file, dir, configured.map(Path::to_path_buf))
        .into_iter()
        .find_map(|target| target.open().ok().map(|appender| (target, appender)))
}

/// Install the global subscriber. Falls back to JSON on stderr when no log
/// location is writable.
pub fn init(verbosity: Verbosity, log_level: &str, log_dir: Option<&Path>) -> LogGuard {
    let (target, (writer, worker)) = match open_log(log_dir) {
        Some((target, appender)) => (Some(target), tracing_appender::non_blocking(appender)),
        None => {
            eprintln!("warning: no writable log location; logging to stderr");
            (None, tracing_appender::non_blocking(std::io::stderr()))
        }
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(true)
        .with_writer(writer)
        .with_filter(verbosity.file_filter(log_level));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(verbosity.stderr_level());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    if let Some(target) = target {
        tracing::debug!(?target, "logging initialized");
    }
    LogGuard { _worker: worker }
}
