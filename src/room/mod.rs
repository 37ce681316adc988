// Room aggregate: player set, optional active game, lifecycle bookkeeping.

pub mod player_set;

pub use player_set::{PlayerSet, PlayerSetError};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::game::{CommandBus, StateContainer};
use crate::protocol::{GameId, GameMode, PlayerId, RoomId, RoomPhase, RoomSnapshot, RoomSummary};

/// The live game attached to a room between `start_game` and teardown.
///
/// The container and bus are owned here and only touched under the room
/// lock; the bus reaches the container through this struct rather than
/// holding a reference to it.
pub struct ActiveGame {
    pub container: StateContainer,
    pub bus: CommandBus,
}

/// A bounded group of players hosting at most one active game at a time.
pub struct Room {
    pub id: RoomId,
    pub host_id: PlayerId,
    pub game_id: GameId,
    pub mode: GameMode,
    pub metadata: HashMap<String, String>,
    pub players: PlayerSet,
    pub game: Option<ActiveGame>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Disconnected members whose seats are held for reconnection.
    pub disconnect_grace: HashMap<PlayerId, Instant>,
    /// Set when a departure triggered teardown; joins are refused from then on.
    pub is_closing: bool,
    start_guard: Option<Instant>,
}

impl Room {
    pub fn new(
        id: RoomId,
        host_id: PlayerId,
        game_id: GameId,
        mode: GameMode,
        min_players: usize,
        max_players: usize,
        metadata: HashMap<String, String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            host_id,
            game_id,
            mode,
            metadata,
            players: PlayerSet::new(min_players, max_players),
            game: None,
            created_at: now,
            last_activity: now,
            disconnect_grace: HashMap::new(),
            is_closing: false,
            start_guard: None,
        }
    }

    /// Update the last activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn phase(&self) -> RoomPhase {
        if self.is_closing {
            RoomPhase::Closing
        } else if self.game.is_some() {
            RoomPhase::Playing
        } else {
            RoomPhase::Lobby
        }
    }

    /// Whether this room appears in the public lobby list.
    pub fn is_listed(&self) -> bool {
        self.mode == GameMode::Lan
            && !self.is_closing
            && self.players.len() < self.players.max_players()
    }

    /// Single-flight guard for `startGame`: the first caller within the
    /// window wins, later callers are told a start is already in flight.
    pub fn try_begin_start(&mut self, window: Duration) -> bool {
        if let Some(at) = self.start_guard {
            if at.elapsed() < window {
                return false;
            }
        }
        self.start_guard = Some(Instant::now());
        true
    }

    pub fn clear_start_guard(&mut self) {
        self.start_guard = None;
    }

    /// Drop grace entries older than `window`, returning the affected ids so
    /// the caller can perform synthetic leaves.
    pub fn purge_expired_grace(&mut self, window: Duration) -> Vec<PlayerId> {
        let expired: Vec<PlayerId> = self
            .disconnect_grace
            .iter()
            .filter(|(_, since)| since.elapsed() >= window)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.disconnect_grace.remove(id);
        }
        expired
    }

    /// Whether the room qualifies for reaping: no members and no activity
    /// inside the idle window.
    pub fn is_expired(&self, idle_timeout: chrono::Duration) -> bool {
        self.players.is_empty()
            && Utc::now().signed_duration_since(self.last_activity) > idle_timeout
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            game_type: self.game_id.clone(),
            mode: self.mode,
            host_id: self.host_id.clone(),
            phase: self.phase(),
            players: self.players.list(),
            min_players: self.players.min_players(),
            max_players: self.players.max_players(),
            created_at: self.created_at,
        }
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.id.clone(),
            game_type: self.game_id.clone(),
            mode: self.mode,
            player_count: self.players.len(),
            max_players: self.players.max_players(),
            host_id: self.host_id.clone(),
        }
    }
}
