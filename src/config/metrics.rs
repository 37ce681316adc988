//! Resource monitor configuration.

use serde::{Deserialize, Serialize};

use super::defaults::default_sample_interval;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MetricsConfig {
    /// Interval between resource samples (seconds)
    #[serde(default = "default_sample_interval")]
    pub sample_interval: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
        }
    }
}
