//! Logging setup shared by the binaries.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Name of the log file inside the logs directory.
pub const LOG_FILE_NAME: &str = "nexus.log";

const LOG_FILE_PREFIX: &str = "nexus";
const LOG_FILE_SUFFIX: &str = "log";

/// Filter used when `RUST_LOG` is not set.
///
/// The protocol library is chatty at `info`, so it is held at `warn`.
#[must_use]
pub fn default_directives(level: &str) -> String {
    format!("{level},grammers=warn")
}

/// Opens `dir/nexus.log` for appending behind a background writer.
///
/// Lines are flushed by the worker until the guard is dropped.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn file_writer(dir: &Path) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initializes the logging subsystem.
///
/// Logs go to stdout and, when `log_dir` is given, without colors to
/// `log_dir/nexus.log`. `RUST_LOG` overrides `level`.
///
/// The returned guard must stay alive for as long as file logging is
/// wanted; dropping it flushes and stops the writer.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
