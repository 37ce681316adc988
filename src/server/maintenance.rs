use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::protocol::RoomId;

use super::{chrono_duration_from_std, GameServer};

impl GameServer {
    /// Periodic janitor: purges expired disconnect-grace entries (performing
    /// synthetic leaves) and reaps idle empty rooms.
    pub async fn sweep_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.run_sweep().await;
        }
    }

    /// One sweep pass. Exposed separately so tests can drive it without the
    /// timer.
    pub async fn run_sweep(&self) {
        let idle_timeout = chrono_duration_from_std(self.config.idle_room_timeout);
        let room_ids: Vec<RoomId> = self.rooms.iter().map(|entry| entry.key().clone()).collect();

        for room_id in room_ids {
            let Some(room_arc) = self.room(&room_id) else {
                continue;
            };

            // Grace expiry -> synthetic leave for each affected player.
            let expired = {
                let mut room = room_arc.lock().await;
                room.purge_expired_grace(self.config.disconnect_grace)
            };
            for player_id in expired {
                self.metrics.grace_expirations.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    %player_id,
                    %room_id,
                    instance_id = %self.instance_id,
                    "Reconnection window expired; removing player"
                );
                if let Err(err) = self.leave_room(&player_id, "did not reconnect in time").await {
                    tracing::debug!(%player_id, error = %err, "Synthetic leave was a no-op");
                }
            }

            let Some(room_arc) = self.room(&room_id) else {
                // The synthetic leaves emptied and deleted the room.
                continue;
            };

            // A live game that dropped below its minimum seat count cannot
            // continue; close the room with advance warning.
            let understaffed = {
                let room = room_arc.lock().await;
                !room.is_closing
                    && room.game.is_some()
                    && room.players.len() < room.players.min_players()
            };
            if understaffed {
                tracing::info!(%room_id, "Active game below minimum players; closing room");
                self.delete_room(&room_id, "not enough players remain").await;
                continue;
            }

            // Idle reap: empty and quiet for the whole idle window.
            let expired = {
                let room = room_arc.lock().await;
                !room.is_closing && room.is_expired(idle_timeout)
            };
            if expired {
                self.metrics.idle_rooms_swept.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%room_id, instance_id = %self.instance_id, "Reaping idle room");
                self.delete_room(&room_id, "idle").await;
            }
        }

        let purged = self.rate_limiter.cleanup_old_entries().await;
        if purged > 0 {
            tracing::debug!(purged, "Dropped idle rate-limit windows");
        }
    }
}
