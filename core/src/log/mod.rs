//! Logging bootstrap for hosts embedding the adapters.
//!
//! The adapters only emit `tracing` events; nothing is printed unless the host installs a
//! subscriber. [`init`] installs one with a stderr layer and, when a directory is configured, a
//! rolling file sink. The first call wins and later calls return the same [`LogHandle`].

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, util::SubscriberInitExt};

const ENV_FILTER_VARS: [&str; 2] = ["REMOTE_FOLDERS_LOG", "RUST_LOG"];

static LOG_HANDLE: OnceLock<LogHandle> = OnceLock::new();

pub use tracing_subscriber::filter::LevelFilter as LogLevel;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogRolling {
    Hourly,
    Daily,
    Never,
}

impl LogRolling {
    fn rotation(self) -> Rotation {
        match self {
            LogRolling::Hourly => Rotation::HOURLY,
            LogRolling::Daily => Rotation::DAILY,
            LogRolling::Never => Rotation::NEVER,
        }
    }
}

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for rolling log files. `None` logs to stderr only.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    /// Rolled files kept in `directory`; older ones are deleted at startup.
    pub retention: usize,
    pub rolling: LogRolling,
    pub file_level: LevelFilter,
    pub console_level: LevelFilter,
    /// Forward records from crates that use `log` instead of `tracing`.
    pub capture_log: bool,
    /// Filter directive such as `remote_folders_core=debug`. Falls back to the environment.
    pub env_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "remote-folders".to_string(),
            retention: 7,
            rolling: LogRolling::Daily,
            file_level: LevelFilter::DEBUG,
            console_level: if cfg!(debug_assertions) { LevelFilter::INFO } else { LevelFilter::WARN },
            capture_log: true,
            env_filter: None,
        }
    }
}

impl LogConfig {
    pub fn with_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.directory = Some(path.into());
        self
    }

    /// Log into the platform data directory, e.g. `~/.local/share/remote-folders/logs`.
    pub fn with_default_directory(self) -> Self {
        self.with_directory(default_log_directory())
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    fn directive(&self) -> String {
        self.env_filter
            .clone()
            .or_else(|| ENV_FILTER_VARS.iter().find_map(|var| std::env::var(var).ok()))
            .filter(|directive| !directive.trim().is_empty())
            .unwrap_or_else(|| if cfg!(debug_assertions) { "debug" } else { "info" }.to_string())
    }
}

/// Keeps the background file writer alive for the life of the process.
#[derive(Debug)]
pub struct LogHandle {
    _guard: Option<WorkerGuard>,
    directory: Option<PathBuf>,
}

impl LogHandle {
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }
}

pub fn init(config: LogConfig) -> Result<&'static LogHandle> {
    if let Some(handle) = LOG_HANDLE.get() {
        return Ok(handle);
    }

    let handle = setup(config)?;
    let _ = LOG_HANDLE.set(handle);
    LOG_HANDLE.get().context("log handle missing after initialisation")
}

fn setup(config: LogConfig) -> Result<LogHandle> {
    if config.capture_log {
        let max_level = config.file_level.max(config.console_level);
        let _ = tracing_log::LogTracer::builder().with_max_level(to_log_level(max_level)).init();
    }

    let env_filter =
        EnvFilter::try_new(config.directive()).context("parsing log filter directive")?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(config.console_level);

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            fs::create_dir_all(directory)
                .with_context(|| format!("creating log directory at {}", directory.display()))?;
            if config.retention > 0 {
                prune_old_logs(directory, &config.file_prefix, config.retention)
                    .context("applying log retention policy")?;
            }

            let appender = tracing_appender::rolling::Builder::new()
                .rotation(config.rolling.rotation())
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(directory)
                .context("creating rolling log appender")?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_file(true)
                .with_line_number(true)
                .with_filter(config.file_level);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err))?;

    Ok(LogHandle { _guard: guard, directory: config.directory })
}

fn to_log_level(level: LevelFilter) -> log::LevelFilter {
    match level {
        LevelFilter::OFF => log::LevelFilter::Off,
        LevelFilter::ERROR => log::LevelFilter::Error,
        LevelFilter::WARN => log::LevelFilter::Warn,
        LevelFilter::INFO => log::LevelFilter::Info,
        LevelFilter::DEBUG => log::LevelFilter::Debug,
        LevelFilter::TRACE => log::LevelFilter::Trace,
    }
}

fn prune_old_logs(dir: &Path, prefix: &str, retention: usize) -> Result<()> {
    let mut entries: Vec<(PathBuf, SystemTime)> = fs::read_dir(dir)
        .with_context(|| format!("reading log directory at {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.metadata().map(|meta| meta.is_file()).unwrap_or(false))
        .filter(|entry| matches_prefix(&entry.path(), prefix))
        .map(|entry| {
            let modified =
                entry.metadata().and_then(|meta| meta.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            (entry.path(), modified)
        })
        .collect();

    if entries.len() <= retention {
        return Ok(());
    }

    entries.sort_by_key(|(_, modified)| *modified);
    let excess = entries.len() - retention;
    for (path, _) in entries.into_iter().take(excess) {
        let _ = fs::remove_file(&path);
    }
    Ok(())
}

fn matches_prefix(path: &Path, prefix: &str) -> bool {
    path.file_stem().and_then(OsStr::to_str).map(|stem| stem.starts_with(prefix)).unwrap_or(false)
}

fn default_log_directory() -> PathBuf {
    match directories::ProjectDirs::from("org", "RemoteFolders", "remote-folders") {
        Some(dirs) => dirs.data_dir().join("logs"),
        None => std::env::temp_dir().join("remote-folders-logs"),
    }
}
