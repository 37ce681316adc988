use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::protocol::{RoomSummary, ServerMessage};
use crate::room::Room;

use super::GameServer;

impl GameServer {
    /// Wake the coalescing lobby broadcaster. Called after every room-graph
    /// change; bursts collapse into a single `updateRoomList` broadcast.
    pub(crate) fn mark_lobby_dirty(&self) {
        self.lobby_notify.notify_one();
    }

    pub fn room_list_version(&self) -> u64 {
        self.room_list_version.load(Ordering::Relaxed)
    }

    /// Snapshot of all publicly listed rooms: `lan` mode with open seats.
    pub async fn room_list_snapshot(&self) -> Vec<RoomSummary> {
        let handles: Vec<Arc<Mutex<Room>>> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut rooms = Vec::new();
        for handle in handles {
            let room = handle.lock().await;
            if room.is_listed() {
                rooms.push(room.summary());
            }
        }
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    /// The `updateRoomList` payload for a newly attached connection, carrying
    /// the current version without bumping it.
    pub async fn room_list_message_current(&self) -> ServerMessage {
        ServerMessage::UpdateRoomList {
            version: self.room_list_version(),
            rooms: self.room_list_snapshot().await,
            timestamp: Utc::now(),
        }
    }

    /// Issue one versioned `updateRoomList` broadcast to every connection.
    pub async fn broadcast_room_list(&self) -> u64 {
        let rooms = self.room_list_snapshot().await;
        let version = self.room_list_version.fetch_add(1, Ordering::Relaxed) + 1;
        self.metrics
            .room_list_broadcasts
            .fetch_add(1, Ordering::Relaxed);
        self.broadcast_all(ServerMessage::UpdateRoomList {
            version,
            rooms,
            timestamp: Utc::now(),
        });
        version
    }

    /// Long-running coalescing broadcaster: each wakeup drains however many
    /// `mark_lobby_dirty` calls arrived in the same scheduler cycle into one
    /// broadcast.
    pub async fn lobby_broadcast_task(self: Arc<Self>) {
        loop {
            self.lobby_notify.notified().await;
            // Let same-cycle mutations land before snapshotting.
            tokio::task::yield_now().await;
            self.broadcast_room_list().await;
        }
    }

    /// Announce the plugin catalog to everyone whenever the registry
    /// changes.
    pub async fn registry_watch_task(self: Arc<Self>) {
        let mut changes = self.registry.subscribe_changes();
        while changes.changed().await.is_ok() {
            let games = self.registry.list();
            tracing::debug!(count = games.len(), "Plugin registry changed; re-announcing");
            self.broadcast_all(ServerMessage::AvailableGames { games });
        }
    }
}
