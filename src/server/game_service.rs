use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::game::{
    CommandBus, CommandDescriptor, CommandError, RoomContext, StateContainer, StateEvent,
};
use crate::metrics::OP_OUTBOUND;
use crate::protocol::{ErrorCode, PlayerId, RoomId, ServerMessage};
use crate::room::ActiveGame;

use super::GameServer;

#[derive(Debug, Error)]
pub enum GameServiceError {
    #[error("Not in a room")]
    NotInRoom,
    #[error("Only the host may start the game")]
    NotHost,
    #[error("A start request is already in flight")]
    AlreadyStarting,
    #[error("A game is already running in this room")]
    GameActive,
    #[error("Room is not ready to start (need everyone ready and enough players)")]
    RoomNotReady,
    #[error("No game is active in this room")]
    GameNotActive,
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Rules plugin failed to start: {0}")]
    Plugin(String),
}

impl GameServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotInRoom => ErrorCode::NotInRoom,
            Self::NotHost => ErrorCode::Authorization,
            Self::AlreadyStarting => ErrorCode::GameAlreadyStarting,
            Self::GameActive => ErrorCode::Conflict,
            Self::RoomNotReady => ErrorCode::Capacity,
            Self::GameNotActive => ErrorCode::GameNotActive,
            Self::Plugin(_) => ErrorCode::InternalError,
            Self::Command(err) => match err {
                CommandError::MissingType => ErrorCode::Validation,
                CommandError::UnknownCommand(_) => ErrorCode::UnknownCommand,
                CommandError::Rejected(_) => ErrorCode::RulesRejection,
                CommandError::GameAlreadyOver => ErrorCode::GameAlreadyOver,
                CommandError::UndoEmpty => ErrorCode::UndoEmpty,
                CommandError::UndoNotOwner => ErrorCode::UndoNotOwner,
            },
        }
    }
}

impl GameServer {
    /// Start the game in the caller's room. Host-only; requires every member
    /// ready and the plugin's minimum player count met.
    pub async fn start_game(&self, player_id: &PlayerId) -> Result<(), GameServiceError> {
        let room_id = self
            .get_player_room(player_id)
            .ok_or(GameServiceError::NotInRoom)?;
        let room_arc = self.room(&room_id).ok_or(GameServiceError::NotInRoom)?;

        let (message, events) = {
            let mut room = room_arc.lock().await;

            if room.host_id != *player_id {
                return Err(GameServiceError::NotHost);
            }
            // A finished game may be replaced by a host restart; a live one
            // may not.
            if let Some(active) = &room.game {
                if !active.container.state().is_terminal {
                    return Err(GameServiceError::GameActive);
                }
            }
            if !room.try_begin_start(self.config.start_guard_window) {
                return Err(GameServiceError::AlreadyStarting);
            }
            if !room.players.is_ready_to_start() {
                room.clear_start_guard();
                return Err(GameServiceError::RoomNotReady);
            }

            let plugin = self
                .registry
                .get(&room.game_id)
                .ok_or_else(|| GameServiceError::Plugin(format!("`{}` vanished from the registry", room.game_id)))?;

            let ctx = RoomContext {
                room_id: room.id.clone(),
                players: room.players.list(),
                metadata: room.metadata.clone(),
                options: serde_json::Value::Object(serde_json::Map::new()),
            };
            let setup = match plugin.create(&ctx) {
                Ok(setup) => setup,
                Err(err) => {
                    room.clear_start_guard();
                    self.metrics.internal_errors.fetch_add(1, Ordering::Relaxed);
                    return Err(GameServiceError::Plugin(err.to_string()));
                }
            };

            // Roles assigned by the plugin stick to the player records.
            for (id, role) in &setup.roles {
                if let Some(record) = room.players.get_mut(id) {
                    record.role = Some(role.clone());
                }
            }

            let container = StateContainer::new(setup.initial_state.clone());
            let events = container.subscribe();
            room.game = Some(ActiveGame {
                container,
                bus: CommandBus::new(setup.strategies),
            });
            // Once the game is attached the live-game check supersedes the
            // in-flight guard.
            room.clear_start_guard();
            room.touch();

            let message = ServerMessage::GameStart {
                game_state: setup.initial_state,
                players: room.players.list(),
                game_id: room.game_id.clone(),
                mode: room.mode,
            };
            (message, events)
        };

        // Fan out and persist outside the room lock.
        if let Some(server) = self.shared() {
            let forwarder_room = room_id.clone();
            tokio::spawn(async move {
                server.forward_game_events(forwarder_room, events).await;
            });
        }

        self.metrics.games_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%player_id, %room_id, instance_id = %self.instance_id, "Game started");

        let members = self.room_member_ids(&room_id).await;
        self.broadcast_to_members(members, message);
        self.mark_lobby_dirty();

        // Persist the initial snapshot; later snapshots ride stateChanged.
        if let Some(room_arc) = self.room(&room_id) {
            let state = {
                let room = room_arc.lock().await;
                room.game.as_ref().map(|g| g.container.state().clone())
            };
            if let Some(state) = state {
                if let Err(err) = self.repository.save(&room_id, &state).await {
                    self.metrics
                        .repository_save_failures
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(%room_id, error = %err, "Failed to persist initial game state");
                }
            }
        }

        Ok(())
    }

    /// Dispatch a client command against the caller's active game.
    pub async fn submit_command(
        &self,
        player_id: &PlayerId,
        payload: serde_json::Value,
    ) -> Result<u64, GameServiceError> {
        let room_id = self
            .get_player_room(player_id)
            .ok_or(GameServiceError::NotInRoom)?;
        let room_arc = self.room(&room_id).ok_or(GameServiceError::NotInRoom)?;

        let descriptor = CommandDescriptor::from_payload(player_id.clone(), payload)
            .map_err(GameServiceError::Command)?;

        let (version, snapshot, members) = {
            let mut guard = room_arc.lock().await;
            let room = &mut *guard;
            let Some(active) = room.game.as_mut() else {
                return Err(GameServiceError::GameNotActive);
            };

            let result = active
                .bus
                .dispatch(&mut active.container, &room.players, descriptor);
            match result {
                Ok(version) => {
                    room.touch();
                    (version, room.snapshot(), self.member_ids_of(room))
                }
                Err(err) => {
                    if matches!(err, CommandError::Rejected(_)) {
                        self.metrics.commands_rejected.fetch_add(1, Ordering::Relaxed);
                    }
                    return Err(GameServiceError::Command(err));
                }
            }
        };

        self.metrics
            .commands_dispatched
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%player_id, %room_id, version, "Command dispatched");

        // gameStateUpdate rides the container's event stream; this refresh
        // covers room metadata such as last_activity.
        self.broadcast_to_members(
            members,
            ServerMessage::RoomStateUpdate {
                room: Box::new(snapshot),
            },
        );
        self.mark_lobby_dirty();

        Ok(version)
    }

    /// Undo the caller's most recent command.
    pub async fn undo_last(&self, player_id: &PlayerId) -> Result<u64, GameServiceError> {
        let room_id = self
            .get_player_room(player_id)
            .ok_or(GameServiceError::NotInRoom)?;
        let room_arc = self.room(&room_id).ok_or(GameServiceError::NotInRoom)?;

        let version = {
            let mut guard = room_arc.lock().await;
            let room = &mut *guard;
            let Some(active) = room.game.as_mut() else {
                return Err(GameServiceError::GameNotActive);
            };
            let version = active
                .bus
                .undo_last(&mut active.container, Some(player_id))?;
            room.touch();
            version
        };

        self.metrics.undo_operations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%player_id, %room_id, version, "Command undone");
        Ok(version)
    }

    /// Forward one game's state events to its room members and the
    /// repository. Runs until the container (and with it the send half) is
    /// dropped at game teardown.
    pub(crate) async fn forward_game_events(
        self: Arc<Self>,
        room_id: RoomId,
        mut events: broadcast::Receiver<StateEvent>,
    ) {
        loop {
            match events.recv().await {
                Ok(StateEvent::Changed {
                    state,
                    version,
                    context,
                }) => {
                    let started = Instant::now();
                    let members = self.room_member_ids(&room_id).await;
                    self.broadcast_to_members(
                        members,
                        ServerMessage::GameStateUpdate {
                            state: state.clone(),
                            version,
                            context,
                        },
                    );
                    // Best-effort persistence; the in-memory state stays
                    // authoritative when a save fails.
                    if let Err(err) = self.repository.save(&room_id, &state).await {
                        self.metrics
                            .repository_save_failures
                            .fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(%room_id, version, error = %err, "Repository save failed");
                    }
                    self.metrics.record_latency(OP_OUTBOUND, started.elapsed());
                }
                Ok(StateEvent::RoundEnd { payload }) => {
                    let members = self.room_member_ids(&room_id).await;
                    self.broadcast_to_members(members, ServerMessage::RoundEnd(payload));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(%room_id, skipped, "Game event forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!(%room_id, "Game event forwarder stopped");
    }
}
