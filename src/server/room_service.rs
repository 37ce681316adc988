use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;

use crate::broadcast::PlayerIdList;
use crate::protocol::{
    room_codes, validation, ErrorCode, GameId, GameMode, PlayerId, PlayerRecord, RoomId,
    ServerMessage,
};
use crate::room::Room;

use super::GameServer;

#[derive(Debug, Error)]
pub enum RoomServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Unknown game `{0}`")]
    UnknownGame(String),
    #[error("Room `{0}` not found")]
    NotFound(RoomId),
    #[error("Room `{0}` is closing")]
    Closing(RoomId),
    #[error("Room is full ({max} players)")]
    Full { max: usize },
    #[error("Already in a room")]
    AlreadyInRoom,
    #[error("Not in a room")]
    NotInRoom,
    #[error("Server room limit reached")]
    RoomLimit,
    #[error("{0}")]
    RateLimited(String),
    #[error("Could not allocate a room id")]
    IdAllocation,
}

impl RoomServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::UnknownGame(_) => ErrorCode::UnknownGame,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Closing(_) => ErrorCode::RoomClosing,
            Self::Full { .. } | Self::RoomLimit => ErrorCode::Capacity,
            Self::AlreadyInRoom => ErrorCode::AlreadyInRoom,
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::RateLimited(_) => ErrorCode::RateLimited,
            Self::IdAllocation => ErrorCode::InternalError,
        }
    }
}

impl GameServer {
    /// Create a room and auto-join the caller as its ready host.
    ///
    /// In `lan` mode a client-supplied code is ignored and an id is
    /// generated. In `p2p` mode the supplied invite code is used; if a room
    /// with that code already exists the caller is routed to `join_room`
    /// instead of receiving a conflict.
    pub async fn create_room(
        &self,
        player_id: &PlayerId,
        game_type: &str,
        mode: GameMode,
        room_code: Option<&str>,
    ) -> Result<RoomId, RoomServiceError> {
        if let Err(err) = self.rate_limiter.check_room_creation(player_id).await {
            self.metrics
                .rate_limit_rejections
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%player_id, error = %err, "Rate limited room creation");
            return Err(RoomServiceError::RateLimited(err.to_string()));
        }

        validation::validate_game_type(game_type, &self.protocol_config)
            .map_err(RoomServiceError::Validation)?;
        let game_id = GameId::from(game_type);
        let plugin = self
            .registry
            .get(&game_id)
            .ok_or_else(|| RoomServiceError::UnknownGame(game_type.to_string()))?;

        if self.memberships.contains_key(player_id) {
            return Err(RoomServiceError::AlreadyInRoom);
        }

        let room_id = match (mode, room_code) {
            (GameMode::P2p, Some(code)) => {
                let normalized = room_codes::normalize_invite_code(code, &self.protocol_config)
                    .map_err(RoomServiceError::Validation)?;
                let candidate = RoomId::new(normalized);
                if self.rooms.contains_key(&candidate) {
                    // Duplicate invite code: route to join instead of
                    // failing. The creation check above already consumed a
                    // join-budget slot.
                    tracing::debug!(
                        %player_id,
                        room_id = %candidate,
                        "createGame with existing invite code routed to join"
                    );
                    return self.join_room_inner(&candidate, player_id).await;
                }
                candidate
            }
            _ => self.allocate_room_id()?,
        };

        if self.rooms.len() >= self.config.max_rooms {
            self.metrics
                .room_creation_failures
                .fetch_add(1, Ordering::Relaxed);
            return Err(RoomServiceError::RoomLimit);
        }

        let descriptor = plugin.descriptor();
        let mut room = Room::new(
            room_id.clone(),
            player_id.clone(),
            game_id.clone(),
            mode,
            descriptor.min_players,
            descriptor.max_players,
            HashMap::new(),
        );

        let mut host = PlayerRecord::new(player_id.clone(), self.member_display_name(player_id));
        host.is_ready = true;
        // Capacity is at least 1 for every registered plugin.
        room.players
            .add(host)
            .map_err(|_| RoomServiceError::Full {
                max: descriptor.max_players,
            })?;

        let snapshot = room.snapshot();
        match self.rooms.entry(room_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                // Lost a race for the same id; invite codes route to join.
                if mode == GameMode::P2p {
                    return self.join_room_inner(&room_id, player_id).await;
                }
                return Err(RoomServiceError::IdAllocation);
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(Arc::new(tokio::sync::Mutex::new(room)));
            }
        }
        self.memberships.insert(player_id.clone(), room_id.clone());

        self.metrics.rooms_created.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            %player_id,
            %room_id,
            game_id = %game_id,
            ?mode,
            instance_id = %self.instance_id,
            "Room created"
        );

        self.send_to_player(
            player_id,
            ServerMessage::JoinedMatchLobby {
                room: Box::new(snapshot),
                your_id: player_id.clone(),
            },
        );
        self.mark_lobby_dirty();

        Ok(room_id)
    }

    /// Join an existing room.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<RoomId, RoomServiceError> {
        if let Err(err) = self.rate_limiter.check_join_attempt(player_id).await {
            self.metrics
                .rate_limit_rejections
                .fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%player_id, %room_id, error = %err, "Rate limited join attempt");
            return Err(RoomServiceError::RateLimited(err.to_string()));
        }
        self.join_room_inner(room_id, player_id).await
    }

    async fn join_room_inner(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<RoomId, RoomServiceError> {
        if let Some(current) = self.get_player_room(player_id) {
            if &current != room_id {
                return Err(RoomServiceError::AlreadyInRoom);
            }
        }

        let room_arc = self
            .room(room_id)
            .ok_or_else(|| RoomServiceError::NotFound(room_id.clone()))?;

        let (snapshot, members) = {
            let mut room = room_arc.lock().await;
            if room.is_closing {
                self.metrics
                    .room_join_failures
                    .fetch_add(1, Ordering::Relaxed);
                return Err(RoomServiceError::Closing(room_id.clone()));
            }

            let record =
                PlayerRecord::new(player_id.clone(), self.member_display_name(player_id));
            room.players.add(record).map_err(|_| {
                self.metrics
                    .room_join_failures
                    .fetch_add(1, Ordering::Relaxed);
                RoomServiceError::Full {
                    max: room.players.max_players(),
                }
            })?;
            room.touch();
            (room.snapshot(), self.member_ids_of(&room))
        };

        self.memberships.insert(player_id.clone(), room_id.clone());
        self.metrics.rooms_joined.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%player_id, %room_id, instance_id = %self.instance_id, "Player joined room");

        self.send_to_player(
            player_id,
            ServerMessage::JoinedMatchLobby {
                room: Box::new(snapshot.clone()),
                your_id: player_id.clone(),
            },
        );
        self.broadcast_to_members(
            members,
            ServerMessage::RoomStateUpdate {
                room: Box::new(snapshot),
            },
        );
        self.mark_lobby_dirty();

        Ok(room_id.clone())
    }

    /// Remove a player from their current room.
    ///
    /// The last member leaving deletes the room immediately; otherwise a
    /// departing host hands the room to the earliest-joined survivor.
    pub async fn leave_room(
        &self,
        player_id: &PlayerId,
        reason: &str,
    ) -> Result<(), RoomServiceError> {
        let Some((_, room_id)) = self.memberships.remove(player_id) else {
            return Err(RoomServiceError::NotInRoom);
        };
        let Some(room_arc) = self.room(&room_id) else {
            return Ok(());
        };

        enum Aftermath {
            DeleteEmpty,
            Notify {
                snapshot: crate::protocol::RoomSnapshot,
                members: PlayerIdList,
                display_name: String,
            },
        }

        let aftermath = {
            let mut room = room_arc.lock().await;
            let Some(removed) = room.players.remove(player_id) else {
                return Ok(());
            };
            room.disconnect_grace.remove(player_id);
            room.touch();

            if room.players.is_empty() {
                room.is_closing = true;
                Aftermath::DeleteEmpty
            } else {
                if room.host_id == *player_id {
                    // Invariant: host_id always names a current member.
                    if let Some(next_host) = room.players.first() {
                        room.host_id = next_host.id.clone();
                        tracing::info!(
                            room_id = %room.id,
                            old_host = %player_id,
                            new_host = %room.host_id,
                            "Host left; promoted earliest-joined survivor"
                        );
                    }
                }
                Aftermath::Notify {
                    snapshot: room.snapshot(),
                    members: self.member_ids_of(&room),
                    display_name: removed.display_name,
                }
            }
        };

        tracing::info!(%player_id, %room_id, reason, "Player left room");

        match aftermath {
            Aftermath::DeleteEmpty => {
                self.finalize_delete_room(&room_id, "empty").await;
            }
            Aftermath::Notify {
                snapshot,
                members,
                display_name,
            } => {
                self.broadcast_to_members(
                    members.clone(),
                    ServerMessage::PlayerLeft {
                        player_id: player_id.clone(),
                        reason: format!("{display_name} {reason}"),
                    },
                );
                self.broadcast_to_members(
                    members,
                    ServerMessage::RoomStateUpdate {
                        room: Box::new(snapshot),
                    },
                );
            }
        }

        self.mark_lobby_dirty();
        Ok(())
    }

    /// Close a room that still has members: announce `roomClosing`, wait the
    /// configured delay, then delete.
    pub async fn delete_room(&self, room_id: &RoomId, reason: &str) {
        let Some(room_arc) = self.room(room_id) else {
            return;
        };

        let members = {
            let mut room = room_arc.lock().await;
            if room.is_closing {
                return;
            }
            room.is_closing = true;
            self.member_ids_of(&room)
        };

        if members.is_empty() {
            self.finalize_delete_room(room_id, reason).await;
            return;
        }

        let delay = self.config.room_closing_delay.max(tokio::time::Duration::from_secs(1));
        self.broadcast_to_members(
            members,
            ServerMessage::RoomClosing {
                room_id: room_id.clone(),
                reason: reason.to_string(),
                seconds_remaining: delay.as_secs(),
            },
        );
        self.mark_lobby_dirty();

        match self.shared() {
            Some(server) => {
                let room_id = room_id.clone();
                let reason = reason.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    server.finalize_delete_room(&room_id, &reason).await;
                });
            }
            // Tearing down; close without the grace delay.
            None => self.finalize_delete_room(room_id, reason).await,
        }
    }

    /// Remove the room from the map, evict memberships, notify members and
    /// drop the persisted snapshot. Dropping the room tears down its state
    /// container, which ends the game event forwarder.
    pub(crate) async fn finalize_delete_room(&self, room_id: &RoomId, reason: &str) {
        let Some((_, _room_arc)) = self.rooms.remove(room_id) else {
            return;
        };

        let members: Vec<PlayerId> = self
            .memberships
            .iter()
            .filter(|entry| entry.value() == room_id)
            .map(|entry| entry.key().clone())
            .collect();
        for member in &members {
            self.memberships.remove(member);
        }

        let message = ServerMessage::RoomClosed {
            room_id: room_id.clone(),
            reason: reason.to_string(),
        };
        self.broadcast_to_members(members.into_iter().collect(), message);

        if let Err(err) = self.repository.remove(room_id).await {
            // Best-effort cleanup; the authoritative state is gone regardless.
            tracing::warn!(%room_id, error = %err, "Failed to remove persisted room state");
        }

        self.metrics.rooms_deleted.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%room_id, reason, instance_id = %self.instance_id, "Room deleted");
        self.mark_lobby_dirty();
    }

    pub(crate) fn member_ids_of(&self, room: &Room) -> PlayerIdList {
        room.players.iter().map(|p| p.id.clone()).collect()
    }

    /// Member ids of a room by id, for callers without the lock.
    pub(crate) async fn room_member_ids(&self, room_id: &RoomId) -> PlayerIdList {
        match self.room(room_id) {
            Some(room_arc) => {
                let room = room_arc.lock().await;
                self.member_ids_of(&room)
            }
            None => PlayerIdList::new(),
        }
    }

    fn member_display_name(&self, player_id: &PlayerId) -> String {
        self.display_name(player_id).unwrap_or_else(|| {
            let short: String = player_id.as_str().chars().take(6).collect();
            format!("Player {short}")
        })
    }

    fn allocate_room_id(&self) -> Result<RoomId, RoomServiceError> {
        for _ in 0..8 {
            let candidate = room_codes::generate_room_id(&self.config.room_id_prefix);
            if !self.rooms.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(RoomServiceError::IdAllocation)
    }
}
