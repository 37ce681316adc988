use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Default constants for validation (can be overridden by config)
/// These are used when no config is available
#[allow(dead_code)]
pub const DEFAULT_MAX_DISPLAY_NAME_CHARS: usize = 24;
#[allow(dead_code)]
pub const DEFAULT_MIN_INVITE_CODE_LENGTH: usize = 3;
#[allow(dead_code)]
pub const DEFAULT_MAX_INVITE_CODE_LENGTH: usize = 10;
#[allow(dead_code)]
pub const DEFAULT_MAX_GAME_TYPE_LENGTH: usize = 50;
/// Prefix used for server-generated room identifiers when none is configured.
pub const DEFAULT_ROOM_ID_PREFIX: &str = "room";

/// Stable identity of a connected participant.
///
/// The value is opaque: either derived from the client-supplied token at
/// `identify` time or generated server-side for anonymous connections.
/// Equality is structural, so a reconnecting client presenting the same
/// token resolves to the same player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh identity for a connection that presented no token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Identifier of a room: either server-generated (`{prefix}_{8 hex}`) or a
/// normalized client-supplied invite code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Stable identifier of a rules plugin (e.g. `checkers`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Visibility mode of a room.
///
/// `lan` rooms are listed in the public lobby; `p2p` rooms are invite-only
/// and joined by sharing their code out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Lan,
    P2p,
}

/// Per-room record of one participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub display_name: String,
    pub is_ready: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub joined_at: DateTime<Utc>,
    /// Role assigned by the rules plugin at game start (e.g. a color).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl PlayerRecord {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_ready: false,
            metadata: HashMap::new(),
            joined_at: Utc::now(),
            role: None,
        }
    }
}

/// Lifecycle phase of a room as observed by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Lobby,
    Playing,
    Closing,
}

/// One row of the lobby room list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub game_type: GameId,
    pub mode: GameMode,
    pub player_count: usize,
    pub max_players: usize,
    pub host_id: PlayerId,
}

/// Enriched view of a single room, sent to its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub game_type: GameId,
    pub mode: GameMode,
    pub host_id: PlayerId,
    pub phase: RoomPhase,
    pub players: Vec<PlayerRecord>,
    pub min_players: usize,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry describing one registered rules plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub game_id: GameId,
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,
    pub category: String,
}
