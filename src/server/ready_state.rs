use crate::protocol::{PlayerId, RoomPhase, ServerMessage};

use super::room_service::RoomServiceError;
use super::GameServer;

impl GameServer {
    /// Flip the caller's ready flag in their current room.
    ///
    /// Ready changes are lobby-phase concepts; while a game is active the
    /// toggle is ignored at the gateway without an error.
    pub async fn toggle_ready(&self, player_id: &PlayerId) -> Result<(), RoomServiceError> {
        let room_id = self
            .get_player_room(player_id)
            .ok_or(RoomServiceError::NotInRoom)?;
        let Some(room_arc) = self.room(&room_id) else {
            return Err(RoomServiceError::NotInRoom);
        };

        let broadcast = {
            let mut room = room_arc.lock().await;
            if room.phase() != RoomPhase::Lobby {
                tracing::debug!(%player_id, %room_id, "Ready toggle ignored outside lobby phase");
                None
            } else {
                let ready = room
                    .players
                    .toggle_ready(player_id)
                    .map_err(|_| RoomServiceError::NotInRoom)?;
                room.touch();
                tracing::debug!(%player_id, %room_id, ready, "Ready flag toggled");
                Some((room.snapshot(), self.member_ids_of(&room)))
            }
        };

        if let Some((snapshot, members)) = broadcast {
            self.broadcast_to_members(
                members,
                ServerMessage::RoomStateUpdate {
                    room: Box::new(snapshot),
                },
            );
            self.mark_lobby_dirty();
        }

        Ok(())
    }
}
