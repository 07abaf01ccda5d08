// logging.rs
// Console and optional file logging

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set.
    pub default_filter: String,
    pub log_file: Option<PathBuf>,
    /// Rotated log files kept next to `log_file`; older ones are deleted.
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            log_file: None,
            max_log_files: 3,
        }
    }
}

/// Where a rotating log lives: `dir/prefix.<date>.suffix`.
#[derive(Debug, PartialEq, Eq)]
struct LogLocation {
    dir: PathBuf,
    prefix: String,
    suffix: Option<String>,
}

fn split_log_path(path: &Path) -> Result<LogLocation> {
    let invalid = || format!("Invalid log file path {}", path.display());
    let prefix = path
        .file_stem()
        .and_then(|n| n.to_str())
        .with_context(invalid)?
        .to_string();
    let suffix = match path.extension() {
        Some(ext) => Some(ext.to_str().with_context(invalid)?.to_string()),
        None => None,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(LogLocation { dir, prefix, suffix })
}

fn rolling_appender(path: &Path, max_log_files: usize) -> Result<RollingFileAppender> {
    let location = split_log_path(path)?;
    std::fs::create_dir_all(&location.dir)
        .with_context(|| format!("Failed to create log directory {}", location.dir.display()))?;
    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(location.prefix)
        .max_log_files(max_log_files.max(1));
    if let Some(suffix) = location.suffix {
        builder = builder.filename_suffix(suffix);
    }
    builder
        .build(&location.dir)
        .with_context(|| format!("Failed to open log file in {}", location.dir.display()))
}

/// Installs the global subscriber. Keep the returned guard alive until exit so file output is
/// flushed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_filter))
    };

    let mut layers = Vec::new();
    layers.push(fmt::layer().with_target(false).with_filter(env_filter()).boxed());

    let mut guard = None;
    if let Some(path) = &config.log_file {
        let appender = rolling_appender(path, config.max_log_files)?;
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard = Some(worker);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter())
                .boxed(),
        );
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}
