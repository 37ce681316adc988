//! Default value functions referenced by the serde derives across the
//! configuration types.

pub(super) fn default_port() -> u16 {
    8081
}

pub(super) fn default_port_scan_limit() -> u16 {
    100
}

// Server section

pub(super) fn default_sweep_interval() -> u64 {
    60
}

pub(super) fn default_disconnect_grace() -> u64 {
    300
}

pub(super) fn default_idle_room_timeout() -> u64 {
    1800
}

pub(super) fn default_start_guard_window_ms() -> u64 {
    2000
}

pub(super) fn default_room_closing_delay() -> u64 {
    1
}

pub(super) fn default_room_id_prefix() -> String {
    crate::protocol::DEFAULT_ROOM_ID_PREFIX.to_string()
}

pub(super) fn default_max_rooms() -> usize {
    1000
}

// Rate limit section

pub(super) fn default_max_room_creations() -> u32 {
    5
}

pub(super) fn default_rate_limit_time_window() -> u64 {
    60
}

pub(super) fn default_max_join_attempts() -> u32 {
    20
}

// Protocol section

pub(super) fn default_max_display_name_chars() -> usize {
    crate::protocol::DEFAULT_MAX_DISPLAY_NAME_CHARS
}

pub(super) fn default_invite_code_min_length() -> usize {
    crate::protocol::DEFAULT_MIN_INVITE_CODE_LENGTH
}

pub(super) fn default_invite_code_max_length() -> usize {
    crate::protocol::DEFAULT_MAX_INVITE_CODE_LENGTH
}

pub(super) fn default_max_game_type_length() -> usize {
    crate::protocol::DEFAULT_MAX_GAME_TYPE_LENGTH
}

// Security section

pub(super) fn default_cors_origins() -> String {
    "*".to_string()
}

pub(super) fn default_max_message_size() -> usize {
    65536
}

pub(super) fn default_max_connections_per_ip() -> usize {
    10
}

// Metrics section

pub(super) fn default_sample_interval() -> u64 {
    3
}

// Logging section

pub(super) fn default_log_dir() -> String {
    "logs".to_string()
}

pub(super) fn default_log_filename() -> String {
    "server.log".to_string()
}

pub(super) fn default_log_rotation() -> String {
    "daily".to_string()
}
