use std::sync::atomic::Ordering;
use std::time::Instant;
use thiserror::Error;

use crate::protocol::{validation, ErrorCode, PlayerId, ServerMessage};

use super::GameServer;

/// Upper bound for client-supplied identity tokens; anything longer is a
/// protocol violation rather than a plausible credential.
const MAX_PLAYER_TOKEN_LENGTH: usize = 128;

#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("{0}")]
    InvalidName(String),
    #[error("Invalid player token")]
    InvalidToken,
    #[error("That identity is already connected")]
    AlreadyConnected,
}

impl IdentifyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidName(_) | Self::InvalidToken => ErrorCode::Validation,
            Self::AlreadyConnected => ErrorCode::Conflict,
        }
    }
}

impl GameServer {
    /// Attach a display name (and optionally a stable identity) to the
    /// connection currently known as `current`.
    ///
    /// When the token resolves to a player sitting in a room's
    /// disconnect-grace table, the connection resumes that seat: the grace
    /// entry is dropped and the caller receives the current room snapshot
    /// plus, for a live game, the current state and version.
    pub async fn identify(
        &self,
        current: &PlayerId,
        username: &str,
        player_token: Option<&str>,
    ) -> Result<PlayerId, IdentifyError> {
        let display_name = validation::sanitize_display_name(username, &self.protocol_config)
            .map_err(IdentifyError::InvalidName)?;

        let player_id = match player_token {
            Some(token) => {
                if token.is_empty() || token.len() > MAX_PLAYER_TOKEN_LENGTH {
                    return Err(IdentifyError::InvalidToken);
                }
                PlayerId::new(token)
            }
            None => current.clone(),
        };

        self.connection_manager
            .rebind(current, &player_id)
            .map_err(|_| IdentifyError::AlreadyConnected)?;
        self.connection_manager
            .set_display_name(&player_id, display_name.clone());

        tracing::info!(
            old_id = %current,
            %player_id,
            display_name,
            instance_id = %self.instance_id,
            "Connection identified"
        );

        self.resume_from_grace(&player_id).await;

        Ok(player_id)
    }

    /// If the identity sits in a grace table, re-subscribe it to its room.
    async fn resume_from_grace(&self, player_id: &PlayerId) {
        let Some(room_id) = self.get_player_room(player_id) else {
            return;
        };
        let Some(room_arc) = self.room(&room_id) else {
            return;
        };

        let resumed = {
            let mut room = room_arc.lock().await;
            if room.disconnect_grace.remove(player_id).is_none() {
                None
            } else {
                room.touch();
                let game = room
                    .game
                    .as_ref()
                    .map(|g| (g.container.state().clone(), g.container.version()));
                Some((room.snapshot(), game))
            }
        };

        let Some((snapshot, game)) = resumed else {
            return;
        };

        self.metrics.grace_reconnections.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%player_id, %room_id, "Player reconnected within grace window");

        self.send_to_player(
            player_id,
            ServerMessage::JoinedMatchLobby {
                room: Box::new(snapshot),
                your_id: player_id.clone(),
            },
        );
        if let Some((state, version)) = game {
            self.send_to_player(
                player_id,
                ServerMessage::GameStateUpdate {
                    state,
                    version,
                    context: None,
                },
            );
        }
    }

    /// Handle a dropped connection.
    ///
    /// Mid-game members keep their seat under a grace entry; lobby members
    /// simply leave (which also promotes a new host when needed).
    pub async fn handle_disconnect(&self, player_id: &PlayerId) {
        self.connection_manager.remove_client(player_id);

        let Some(room_id) = self.get_player_room(player_id) else {
            tracing::info!(%player_id, "Client disconnected");
            return;
        };

        let grace = match self.room(&room_id) {
            Some(room_arc) => {
                let mut room = room_arc.lock().await;
                if room.game.is_some() && room.players.contains(player_id) {
                    room.disconnect_grace
                        .insert(player_id.clone(), Instant::now());
                    let name = room
                        .players
                        .get(player_id)
                        .map(|p| p.display_name.clone())
                        .unwrap_or_else(|| player_id.to_string());
                    Some((self.member_ids_of(&room), name))
                } else {
                    None
                }
            }
            None => None,
        };

        match grace {
            Some((members, display_name)) => {
                self.metrics.grace_entries_added.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%player_id, %room_id, "Player disconnected mid-game; seat held for grace window");
                self.broadcast_to_members(
                    members,
                    ServerMessage::PlayerLeft {
                        player_id: player_id.clone(),
                        reason: format!("{display_name} disconnected (may reconnect)"),
                    },
                );
            }
            None => {
                if let Err(err) = self.leave_room(player_id, "disconnected").await {
                    tracing::debug!(%player_id, error = %err, "Disconnect leave was a no-op");
                }
            }
        }
    }
}
