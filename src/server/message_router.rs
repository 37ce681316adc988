use std::time::Instant;

use crate::metrics::OP_INBOUND;
use crate::protocol::{room_codes, ClientMessage, ErrorCode, PlayerId, RoomId};

use super::GameServer;

impl GameServer {
    /// Translate one inbound client message into the matching service call.
    ///
    /// `player_id` is the caller's current identity and is rewritten in
    /// place when `identify` re-keys the connection to a stable token.
    pub async fn handle_client_message(&self, player_id: &mut PlayerId, message: ClientMessage) {
        let started = Instant::now();

        match message {
            ClientMessage::Identify {
                username,
                player_token,
            } => match self
                .identify(player_id, &username, player_token.as_deref())
                .await
            {
                Ok(new_id) => *player_id = new_id,
                Err(err) => {
                    self.metrics
                        .validation_errors
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("identify"),
                    );
                }
            },
            ClientMessage::CreateGame {
                game_type,
                mode,
                room_code,
            } => {
                if let Err(err) = self
                    .create_room(player_id, &game_type, mode, room_code.as_deref())
                    .await
                {
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("createGame"),
                    );
                }
            }
            ClientMessage::JoinGame(raw) => match normalize_join_target(self, &raw) {
                Ok(room_id) => {
                    if let Err(err) = self.join_room(&room_id, player_id).await {
                        self.send_error_to_player(
                            player_id,
                            err.to_string(),
                            err.code(),
                            Some("joinGame"),
                        );
                    }
                }
                Err(reason) => {
                    self.metrics
                        .validation_errors
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    self.send_error_to_player(
                        player_id,
                        reason,
                        ErrorCode::Validation,
                        Some("joinGame"),
                    );
                }
            },
            ClientMessage::PlayerReady => {
                if let Err(err) = self.toggle_ready(player_id).await {
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("playerReady"),
                    );
                }
            }
            ClientMessage::StartGame => {
                if let Err(err) = self.start_game(player_id).await {
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("startGame"),
                    );
                }
            }
            ClientMessage::SubmitMove(payload) => {
                if let Err(err) = self.submit_command(player_id, payload).await {
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("submitMove"),
                    );
                }
            }
            ClientMessage::UndoMove => {
                if let Err(err) = self.undo_last(player_id).await {
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("undoMove"),
                    );
                }
            }
            ClientMessage::LeaveGame => {
                if let Err(err) = self.leave_room(player_id, "left the game").await {
                    self.send_error_to_player(
                        player_id,
                        err.to_string(),
                        err.code(),
                        Some("leaveGame"),
                    );
                }
            }
        }

        self.metrics.record_latency(OP_INBOUND, started.elapsed());
    }
}

/// A join target is either a server-generated room id (used verbatim) or an
/// invite code (normalized).
fn normalize_join_target(server: &GameServer, raw: &str) -> Result<RoomId, String> {
    if room_codes::is_generated_room_id(raw) {
        return Ok(RoomId::from(raw));
    }
    room_codes::normalize_invite_code(raw, server.protocol_config()).map(RoomId::new)
}
