//! Server behavior configuration types.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_disconnect_grace, default_idle_room_timeout, default_max_join_attempts,
    default_max_room_creations, default_max_rooms, default_rate_limit_time_window,
    default_room_closing_delay, default_room_id_prefix, default_start_guard_window_ms,
    default_sweep_interval,
};

/// Room lifecycle and sweep configuration. Durations are in seconds unless
/// the field name says otherwise.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Interval between janitor sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,
    /// How long a disconnected player's seat is held for reconnection
    #[serde(default = "default_disconnect_grace")]
    pub disconnect_grace: u64,
    /// Inactivity window after which empty rooms are reaped
    #[serde(default = "default_idle_room_timeout")]
    pub idle_room_timeout: u64,
    /// Single-flight window for startGame requests (milliseconds)
    #[serde(default = "default_start_guard_window_ms")]
    pub start_guard_window_ms: u64,
    /// Delay between roomClosing and roomClosed when members remain
    #[serde(default = "default_room_closing_delay")]
    pub room_closing_delay: u64,
    /// Prefix for server-generated room identifiers
    #[serde(default = "default_room_id_prefix")]
    pub room_id_prefix: String,
    /// Cap on concurrently live rooms
    #[serde(default = "default_max_rooms")]
    pub max_rooms: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: default_sweep_interval(),
            disconnect_grace: default_disconnect_grace(),
            idle_room_timeout: default_idle_room_timeout(),
            start_guard_window_ms: default_start_guard_window_ms(),
            room_closing_delay: default_room_closing_delay(),
            room_id_prefix: default_room_id_prefix(),
            max_rooms: default_max_rooms(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of room creation requests per time window
    #[serde(default = "default_max_room_creations")]
    pub max_room_creations: u32,
    /// Time window for rate limiting (seconds)
    #[serde(default = "default_rate_limit_time_window")]
    pub time_window: u64,
    /// Maximum number of join attempts per time window
    #[serde(default = "default_max_join_attempts")]
    pub max_join_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_room_creations: default_max_room_creations(),
            time_window: default_rate_limit_time_window(),
            max_join_attempts: default_max_join_attempts(),
        }
    }
}
