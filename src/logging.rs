//! Tracing subscriber setup.
//!
//! Console output goes to stderr so stdout stays free for the chat surface.
//! When a log directory is configured, a daily rolling file receives the
//! same events without ANSI colours.

use crate::config::LoggingConfig;
use crate::error::{BuddyError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Noisy dependency targets silenced unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &str = "reqwest=warn,hyper=warn,hyper_util=warn,mio=warn";

/// Build the default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };
    format!("{level},{QUIET_TARGETS}")
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig, level_override: Option<&str>) -> Result<Option<WorkerGuard>> {
    let level = level_override.unwrap_or(&config.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(config.file_prefix.as_str())
                .max_log_files(7)
                .build(dir)
                .map_err(|e| BuddyError::Config(format!("cannot open log file: {e}")))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| BuddyError::Config(format!("logger already initialised: {e}")))?;

    if let Some(dir) = &config.directory {
        tracing::info!(log_dir = %dir.display(), "logger initialised");
    }
    Ok(guard)
}
