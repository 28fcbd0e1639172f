//! Logging configuration
//!
//! Log output goes to stderr, to a daily-rotated file, or both. The level
//! comes from `RUST_LOG` (or `--debug`); the sinks from the environment:
//!
//! - `RIP_LOG_FILE`: path of the log file, rotated daily
//! - `RIP_LOG_STDERR`: set to `false` to silence stderr
//! - `RIP_LOG_JSON`: set to `true` for JSON lines in the file

use crate::error::{Result, RipError};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

const DEFAULT_LOG_FILE: &str = "rip-server.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Default level when `RUST_LOG` has no directive for a target
    pub level: Level,

    /// Log to file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// JSON lines in the file sink
    pub json: bool,

    pub thread_ids: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            stderr: true,
            json: false,
            thread_ids: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let mut config = Self::default();

        if let Some(rust_log) = lookup("RUST_LOG") {
            let rust_log = rust_log.to_lowercase();
            config.level = if rust_log.contains("trace") {
                Level::TRACE
            } else if rust_log.contains("debug") {
                Level::DEBUG
            } else if rust_log.contains("warn") {
                Level::WARN
            } else if rust_log.contains("error") {
                Level::ERROR
            } else {
                Level::INFO
            };
        }

        if let Some(log_file) = lookup("RIP_LOG_FILE").filter(|path| !path.is_empty()) {
            config.file_path = Some(PathBuf::from(log_file));
        }
        if let Some(log_stderr) = lookup("RIP_LOG_STDERR") {
            config.stderr = log_stderr.to_lowercase() != "false";
        }
        if let Some(json) = lookup("RIP_LOG_JSON") {
            config.json = json.to_lowercase() == "true";
        }

        config
    }

    /// Raise the level to DEBUG
    pub fn with_debug(mut self, debug: bool) -> Self {
        if debug && self.level < Level::DEBUG {
            self.level = Level::DEBUG;
        }
        self
    }
}

/// Install the global subscriber
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.stderr {
        layers.push(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true)
                .with_thread_ids(config.thread_ids)
                .boxed(),
        );
    }

    if let Some(file_path) = &config.file_path {
        let (directory, file_name) = split_log_path(file_path);
        std::fs::create_dir_all(&directory)?;
        let file_appender = tracing_appender::rolling::daily(directory, file_name);

        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_thread_ids(config.thread_ids);
        layers.push(if config.json {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        });
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| RipError::config(format!("Failed to install logger: {e}")))
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    (directory, file_name)
}
