use std::env::var;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{level_filters::LevelFilter, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    util::TryInitError,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Log file path has no file name: {0}")]
    InvalidPath(PathBuf),
    #[error("Failed to open log file: {0}")]
    Appender(#[from] InitError),
    #[error("Failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Where and how much to log
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub file: PathBuf,
    /// Rotated files kept next to the current one
    pub backups: usize,
    /// Also log to stderr
    pub console: bool,
}

/// Keeps the background log writer alive; drop it last
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Map a level name to a filter.
///
/// Accepts tracing names and the Python-style `WARNING` and `CRITICAL`,
/// case-insensitively.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(LevelFilter::TRACE),
        "DEBUG" => Some(LevelFilter::DEBUG),
        "INFO" => Some(LevelFilter::INFO),
        "WARN" | "WARNING" => Some(LevelFilter::WARN),
        "ERROR" | "CRITICAL" => Some(LevelFilter::ERROR),
        "OFF" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Initialize tracing with a daily-rotated log file.
///
/// `RUST_LOG` overrides `settings.level` and `RUST_LOG_FORMAT=json` switches
/// every layer to JSON output.
pub fn init(settings: &LogSettings) -> Result<LoggingGuard, LoggerError> {
    let appender = rolling_appender(&settings.file, settings.backups)?;
    let (writer, file_guard) = tracing_appender::non_blocking(appender);

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();
    let json = log_format == "json";

    let mut layers = vec![file_layer(writer, json, settings.level)];
    if settings.console {
        layers.push(console_layer(json, settings.level));
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    if !log_format.is_empty() && !json {
        warn!("Unknown RUST_LOG_FORMAT '{log_format}', falling back to default");
    }

    Ok(LoggingGuard { _file_guard: file_guard })
}

fn rolling_appender(file: &Path, backups: usize) -> Result<RollingFileAppender, LoggerError> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoggerError::InvalidPath(file.to_path_buf()))?;
    let directory = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(retained_log_files(backups))
        .build(directory)?;

    Ok(appender)
}

/// Rotated backups plus the file currently written
fn retained_log_files(backups: usize) -> usize {
    backups + 1
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder().with_default_directive(level.into()).from_env_lossy()
}

fn file_layer(writer: NonBlocking, json: bool, level: LevelFilter) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(env_filter(level))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_filter(env_filter(level))
            .boxed()
    }
}

fn console_layer(json: bool, level: LevelFilter) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(level))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter(level))
            .boxed()
    }
}
