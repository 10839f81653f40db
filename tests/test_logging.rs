//! Tests for logging configuration and format parsing
//!
//! Exercises the pure functions in the logging module: format parsing, the
//! level chosen from the quiet/verbose settings and log file handling.

use socket_queue_bridge::config::LoggingSection;
use socket_queue_bridge::observability::logging::{level_for, open_log_file, LogFormat};
use std::io::Write;
use tracing::Level;

#[test]
fn test_log_format_parse_json() {
    assert!(matches!(LogFormat::parse("json"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("JSON"), LogFormat::Json));
    assert!(matches!(LogFormat::parse("Json"), LogFormat::Json));
}

#[test]
fn test_log_format_parse_pretty() {
    assert!(matches!(LogFormat::parse("pretty"), LogFormat::Pretty));
    assert!(matches!(LogFormat::parse("PRETTY"), LogFormat::Pretty));
}

#[test]
fn test_log_format_parse_invalid_defaults_to_compact() {
    assert!(matches!(LogFormat::parse("invalid"), LogFormat::Compact));
    assert!(matches!(LogFormat::parse(""), LogFormat::Compact));
    assert!(matches!(LogFormat::parse("yaml"), LogFormat::Compact));
}

#[test]
fn test_log_format_parse_whitespace() {
    assert!(matches!(LogFormat::parse("  json  "), LogFormat::Json));
    assert!(matches!(LogFormat::parse("pretty\n"), LogFormat::Pretty));
}

#[test]
fn test_quiet_and_verbose_levels() {
    let quiet = LoggingSection {
        quiet: true,
        ..LoggingSection::default()
    };
    assert_eq!(level_for(&quiet), Level::WARN);
    assert_eq!(level_for(&LoggingSection::default()), Level::INFO);

    let debug = LoggingSection {
        verbose: 1,
        ..LoggingSection::default()
    };
    assert_eq!(level_for(&debug), Level::DEBUG);

    let trace = LoggingSection {
        verbose: 2,
        ..LoggingSection::default()
    };
    assert_eq!(level_for(&trace), Level::TRACE);
}

#[test]
fn test_log_file_is_created_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested.log");
    assert!(!path.exists());

    let mut file = open_log_file(&path).unwrap();
    writeln!(file, "bridge started").unwrap();
    drop(file);

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "bridge started\n");
}
