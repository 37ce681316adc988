//! Snapshot persistence for active games.
//!
//! The repository is a best-effort sink: the authoritative state lives in
//! memory and a failed save never fails the dispatch that produced it. The
//! default backend is in-memory; a durable backend plugs in behind the same
//! trait and stores `(room_id -> latest GameState)` as opaque blobs.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::game::GameState;
use crate::protocol::RoomId;

#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Persist the latest state for a room. Called on every sync.
    async fn save(&self, room_id: &RoomId, state: &GameState) -> anyhow::Result<()>;

    /// Fetch the latest persisted state, if any.
    async fn load(&self, room_id: &RoomId) -> anyhow::Result<Option<GameState>>;

    /// Drop everything stored for a room. Called when the room is deleted.
    async fn remove(&self, room_id: &RoomId) -> anyhow::Result<()>;
}

/// Default repository: process-local, nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    states: DashMap<RoomId, GameState>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn save(&self, room_id: &RoomId, state: &GameState) -> anyhow::Result<()> {
        self.states.insert(room_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, room_id: &RoomId) -> anyhow::Result<Option<GameState>> {
        Ok(self.states.get(room_id).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, room_id: &RoomId) -> anyhow::Result<()> {
        self.states.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_load_remove_round_trip() {
        let repo = InMemoryStateRepository::new();
        let room_id = RoomId::from("room_0a1b2c3d");
        let state = GameState::new(json!({"round": 1}));

        assert!(repo.load(&room_id).await.unwrap().is_none());

        repo.save(&room_id, &state).await.unwrap();
        let loaded = repo.load(&room_id).await.unwrap().unwrap();
        assert_eq!(loaded, state);

        repo.remove(&room_id).await.unwrap();
        assert!(repo.load(&room_id).await.unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_previous_snapshot() {
        let repo = InMemoryStateRepository::new();
        let room_id = RoomId::from("room_0a1b2c3d");

        repo.save(&room_id, &GameState::new(json!({"v": 1})))
            .await
            .unwrap();
        repo.save(&room_id, &GameState::new(json!({"v": 2})))
            .await
            .unwrap();

        let loaded = repo.load(&room_id).await.unwrap().unwrap();
        assert_eq!(loaded.data, json!({"v": 2}));
        assert_eq!(repo.len(), 1);
    }
}
