//! Configuration module.
//!
//! Configuration merges, in increasing precedence: compiled defaults,
//! `config.json` next to the executable, `config.json` in the CWD, the file
//! named by `PARLOR_CONFIG_PATH`, JSON on stdin (when
//! `PARLOR_CONFIG_STDIN=true`), inline JSON via `PARLOR_CONFIG_JSON`, and
//! `PARLOR__`-prefixed environment overrides with `__` as the nested
//! separator (`PARLOR__SERVER__SWEEP_INTERVAL=30`; comma-separated values
//! become arrays).

// Submodules
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod protocol;
pub mod security;
pub mod server;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use metrics::MetricsConfig;

pub use protocol::ProtocolConfig;

pub use security::SecurityConfig;

pub use server::{RateLimitConfig, ServerConfig};

pub use types::Config;

pub use validation::validate_config;
