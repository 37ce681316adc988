//! Logging configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::defaults::{default_log_dir, default_log_filename, default_log_rotation};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Explicit level; when absent, `RUST_LOG` applies with `info` fallback
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub enable_file_logging: bool,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
    /// `daily`, `hourly` or `never`
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::default(),
            enable_file_logging: false,
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: default_log_rotation(),
        }
    }
}
