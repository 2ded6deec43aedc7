//! Logging utilities for the HA control crates.

use std::fmt;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Per-node log level as accepted in configuration.
///
/// The syslog-style names collapse onto the nearest `tracing` level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Alert,
    Critical,
    Emergency,
}

const LEVEL_TABLE: &[(&str, LogLevel)] = &[
    ("debug", LogLevel::Debug),
    ("info", LogLevel::Info),
    ("notice", LogLevel::Notice),
    ("warning", LogLevel::Warning),
    ("error", LogLevel::Error),
    ("alert", LogLevel::Alert),
    ("critical", LogLevel::Critical),
    ("emergency", LogLevel::Emergency),
];

impl LogLevel {
    /// Look up a level by name. Unrecognized names map to `Debug`.
    pub fn parse(name: &str) -> Self {
        LEVEL_TABLE
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, level)| *level)
            .unwrap_or(LogLevel::Debug)
    }

    /// `EnvFilter` directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info | LogLevel::Notice => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Alert | LogLevel::Critical | LogLevel::Emergency => {
                "error"
            }
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = LEVEL_TABLE
            .iter()
            .find(|(_, level)| level == self)
            .map(|(key, _)| *key)
            .unwrap_or("debug");
        f.write_str(name)
    }
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()))
}

/// Initialize tracing at the given level.
///
/// RUST_LOG, when set, takes precedence over `level`.
pub fn init(level: LogLevel) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter(level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json(level: LogLevel) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().json())
        .with(filter(level))
        .init();
}
