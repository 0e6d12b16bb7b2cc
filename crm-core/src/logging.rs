//! `tracing` subscriber setup.
//!
//! Events go to stderr in compact form and to a daily-rolling file under
//! the log directory, optionally as JSON lines.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::constants::LOG_FILE_NAME;
use crate::error::{CrmError, CrmResult};

/// Keeps the background file writer running; dropping it flushes the file.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Parse a level or directive list, falling back to `info`.
fn filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn stderr_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer().with_writer(std::io::stderr).with_target(true).compact()
}

/// Install the global subscriber.
///
/// `level` accepts plain levels ("debug") or directives
/// ("info,crm_realtime=trace").
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> CrmResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;
    let (writer, worker) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true);
    let file_layer = if json_output {
        file_layer.json().boxed()
    } else {
        file_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(filter(level))
        .with(stderr_layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| CrmError::Internal(format!("logging already initialized: {e}")))?;

    tracing::debug!(filter = level, dir = %log_dir.display(), json_output, "logging ready");
    Ok(LogGuard { _worker: worker })
}

/// Install the global subscriber from the `[logging]` section.
pub fn init_from_config(config: &LoggingConfig, log_dir: &Path) -> CrmResult<LogGuard> {
    init_logging(&config.level, log_dir, config.json_output)
}

/// Stderr-only subscriber for tests and tools without a log directory.
/// A second call is a no-op.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(stderr_layer())
        .try_init();
}
