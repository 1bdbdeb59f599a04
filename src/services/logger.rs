use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the structured logging system.
///
/// Sets up:
/// - File output: rolling log files `{log_dir}/joplin-mcp.YYYY-MM-DD.log`
///   with daily rotation, keeping the latest 5 files.
/// - Console output (stderr): stdout carries JSON-RPC in stdio mode, so the
///   console layer never writes there.
/// - Environment filter: `RUST_LOG` if set, otherwise `level` with noisy
///   HTTP crates held at `warn`.
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(log_dir: &Path, level: &str) -> Result<(), String> {
    fs::create_dir_all(log_dir)
        .map_err(|e| format!("Failed to create log directory {}: {}", log_dir.display(), e))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("joplin-mcp")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)
        .map_err(|e| format!("Failed to create log file appender: {}", e))?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .compact();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .map_err(|e| format!("Invalid log level '{}': {}", level, e))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| format!("Logger already initialized: {}", e))?;

    tracing::info!(log_dir = %log_dir.display(), "Logger initialized");
    Ok(())
}

fn default_directives(level: &str) -> String {
    format!("{},reqwest=warn,hyper=warn,hyper_util=warn,mio=warn", level.trim().to_lowercase())
}
