use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{ChangeContext, GameState};

use super::error_codes::ErrorCode;
use super::types::{
    GameId, GameMode, PlayerId, PlayerRecord, PluginDescriptor, RoomId, RoomSnapshot, RoomSummary,
};

/// Message types sent from client to server.
///
/// Framing is `{"type": <event name>, "data": <payload>}`; one message per
/// event. An unrecognized `type` fails deserialization and is answered with
/// `error{code=unknown_event}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Attach a display name (and optionally a stable identity token) to the
    /// connection. Should be the first message a client sends.
    #[serde(rename = "identify", rename_all = "camelCase")]
    Identify {
        username: String,
        /// Opaque token from the authentication boundary. Presenting the
        /// same token on a new connection resumes the same player identity.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_token: Option<String>,
    },
    /// Create a room and auto-join as its (ready) host.
    #[serde(rename = "createGame", rename_all = "camelCase")]
    CreateGame {
        game_type: String,
        #[serde(default)]
        mode: GameMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_code: Option<String>,
    },
    /// Join an existing room by id or invite code.
    #[serde(rename = "joinGame")]
    JoinGame(String),
    /// Toggle the caller's ready flag in their current room.
    #[serde(rename = "playerReady")]
    PlayerReady,
    /// Host-only: start the game in the caller's current room.
    #[serde(rename = "startGame")]
    StartGame,
    /// Submit a game command. The payload carries the command `type` plus
    /// strategy-specific fields. `movePiece` is the legacy alias.
    #[serde(rename = "submitMove", alias = "movePiece")]
    SubmitMove(serde_json::Value),
    /// Undo the caller's most recent command.
    #[serde(rename = "undoMove")]
    UndoMove,
    /// Leave the caller's current room.
    #[serde(rename = "leaveGame")]
    LeaveGame,
}

/// Message types sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Catalog of registered rules plugins; sent on connect and whenever the
    /// registry changes.
    #[serde(rename = "availableGames")]
    AvailableGames { games: Vec<PluginDescriptor> },
    /// Lobby room list delta. `version` strictly increases process-wide;
    /// clients must discard payloads with `version <= last_seen`.
    #[serde(rename = "updateRoomList", rename_all = "camelCase")]
    UpdateRoomList {
        version: u64,
        rooms: Vec<RoomSummary>,
        timestamp: DateTime<Utc>,
    },
    /// Confirmation of a create or join, addressed to the joining player.
    #[serde(rename = "joinedMatchLobby", rename_all = "camelCase")]
    JoinedMatchLobby {
        room: Box<RoomSnapshot>,
        your_id: PlayerId,
    },
    /// Enriched room snapshot pushed to members after any room mutation.
    #[serde(rename = "roomStateUpdate")]
    RoomStateUpdate { room: Box<RoomSnapshot> },
    /// The game began. `players` carries the roles assigned at start.
    #[serde(rename = "gameStart", rename_all = "camelCase")]
    GameStart {
        game_state: GameState,
        players: Vec<PlayerRecord>,
        game_id: GameId,
        mode: GameMode,
    },
    /// Authoritative state push after a successful command or undo.
    #[serde(rename = "gameStateUpdate", rename_all = "camelCase")]
    GameStateUpdate {
        state: GameState,
        version: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<ChangeContext>,
    },
    /// Plugin-defined round boundary payload, forwarded verbatim.
    #[serde(rename = "roundEnd")]
    RoundEnd(serde_json::Value),
    /// Advance warning that the room is about to close.
    #[serde(rename = "roomClosing", rename_all = "camelCase")]
    RoomClosing {
        room_id: RoomId,
        reason: String,
        seconds_remaining: u64,
    },
    /// The room is gone.
    #[serde(rename = "roomClosed", rename_all = "camelCase")]
    RoomClosed { room_id: RoomId, reason: String },
    /// A member left the room (voluntarily or by disconnect/grace expiry).
    #[serde(rename = "playerLeft", rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId, reason: String },
    /// Structured error addressed to a single connection.
    #[serde(rename = "error")]
    Error {
        message: String,
        code: ErrorCode,
        /// The inbound event that triggered the error, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>, code: ErrorCode, action: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            code,
            action: action.map(str::to_string),
        }
    }
}
