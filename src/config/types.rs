//! Root configuration struct.

use serde::{Deserialize, Serialize};

use super::defaults::{default_port, default_port_scan_limit};
use super::logging::LoggingConfig;
use super::metrics::MetricsConfig;
use super::protocol::ProtocolConfig;
use super::security::SecurityConfig;
use super::server::{RateLimitConfig, ServerConfig};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Preferred listen port. If busy, the server scans upward from here.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How many ports above `port` to try before giving up.
    #[serde(default = "default_port_scan_limit")]
    pub port_scan_limit: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            port_scan_limit: default_port_scan_limit(),
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            protocol: ProtocolConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
