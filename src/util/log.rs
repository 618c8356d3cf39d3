// src/util/log.rs

//! Logging setup. Events go through `tracing`; the `log_*!` macros are thin
//! wrappers so call sites stay short and accept structured fields.
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::config::LogConfig;
use crate::error::{Result, SprinklerError};

pub use tracing;

pub const LOG_FILE_NAME: &str = "sprinkler.log";

/// Local wall-clock timestamps, same format the field units print.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Debug output is on when the config asks for it or `DEBUG=true` is exported.
pub fn max_level(config: &LogConfig) -> Level {
    let env_debug = std::env::var("DEBUG").unwrap_or_default() == "true";
    if config.debug || env_debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Create the log directory if needed and truncate the log file (fresh file per run).
pub fn open_log_file(log_dir: &Path) -> std::io::Result<(PathBuf, File)> {
    create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = File::create(&path)?;
    Ok((path, file))
}

/// Install the global subscriber. Writes to `log_dir/sprinkler.log` when a
/// directory is configured, otherwise to stderr.
pub fn init(config: &LogConfig) -> Result<()> {
    let level = max_level(config);

    let installed = match &config.log_dir {
        Some(dir) => {
            let (_, file) = open_log_file(dir)?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(LocalTimer)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_timer(LocalTimer)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| SprinklerError::RuntimeError(format!("Failed to install logger: {}", e)))
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        $crate::util::log::tracing::error!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        $crate::util::log::tracing::warn!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        $crate::util::log::tracing::info!($($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        $crate::util::log::tracing::debug!($($arg)*);
    }};
}
