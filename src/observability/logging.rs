//! Structured logging using the tracing crate
//!
//! ## Log Format Options
//!
//! The console format is controlled by the `LOG_FORMAT` environment variable:
//!
//! - `json` - Structured JSON for log aggregation systems
//! - `pretty` - Human-readable, multi-line, with colors
//! - `compact` - Terminal-friendly single lines (default)
//!
//! ## Levels
//!
//! `--quiet` shows warnings and errors only, the default is INFO, `-v` adds
//! DEBUG and `-vv` TRACE. `RUST_LOG` overrides all of them.
//!
//! When a log file is configured every event is also appended to it, without
//! ANSI colors, regardless of the console format.
//!
//! ```bash
//! LOG_FORMAT=json socket-queue-bridge -b broker.local -L /var/log/bridge.log
//! RUST_LOG=socket_queue_bridge=trace socket-queue-bridge --text
//! ```

use crate::config::LoggingSection;
use crate::error::{BridgeError, BridgeResult};
use std::env;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Dependencies whose INFO output drowns out the bridge's own
const QUIET_DEPENDENCIES: &[&str] = &["rumqttc=warn", "tokio=warn"];

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string; unknown values fall back to compact
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }

    /// Format selected by `LOG_FORMAT`
    pub fn from_env() -> Self {
        env::var("LOG_FORMAT")
            .map(|format| Self::parse(&format))
            .unwrap_or(LogFormat::Compact)
    }
}

/// Level implied by the quiet/verbose settings
pub fn level_for(logging: &LoggingSection) -> Level {
    if logging.quiet {
        return Level::WARN;
    }
    match logging.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Filter for `level`, with noisy dependencies turned down. `RUST_LOG`
/// replaces it entirely when set.
pub fn build_filter(level: Level) -> EnvFilter {
    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    QUIET_DEPENDENCIES
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(EnvFilter::new(level.to_string()), |filter, directive| {
            filter.add_directive(directive)
        })
}

/// Open (or create) the log file in append mode
pub fn open_log_file(path: &Path) -> BridgeResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            BridgeError::logging_error(format!("cannot open log file {}: {e}", path.display()))
        })
}

/// Install the global subscriber: console output on stderr in `format`, plus
/// the optional log file.
pub fn init_logging(logging: &LoggingSection, format: LogFormat) -> BridgeResult<()> {
    let filter = build_filter(level_for(logging));

    let file_layer = match &logging.file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_ansi(false)
                .with_target(false),
        ),
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    let installed = match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().pretty().with_ansi(true).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    installed.map_err(|e| BridgeError::logging_error(e.to_string()))
}
