//! Protocol validation limits.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_invite_code_max_length, default_invite_code_min_length,
    default_max_display_name_chars, default_max_game_type_length,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProtocolConfig {
    /// Maximum display name length in characters (after normalization)
    #[serde(default = "default_max_display_name_chars")]
    pub max_display_name_chars: usize,
    /// Minimum length of a normalized invite code
    #[serde(default = "default_invite_code_min_length")]
    pub invite_code_min_length: usize,
    /// Maximum length of a normalized invite code
    #[serde(default = "default_invite_code_max_length")]
    pub invite_code_max_length: usize,
    /// Maximum game type identifier length in bytes
    #[serde(default = "default_max_game_type_length")]
    pub max_game_type_length: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_display_name_chars: default_max_display_name_chars(),
            invite_code_min_length: default_invite_code_min_length(),
            invite_code_max_length: default_invite_code_max_length(),
            max_game_type_length: default_max_game_type_length(),
        }
    }
}
