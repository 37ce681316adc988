use thiserror::Error;

use crate::protocol::{PlayerId, PlayerRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlayerSetError {
    #[error("room is full ({max} players)")]
    Full { max: usize },
    #[error("player `{0}` is not in this room")]
    UnknownPlayer(PlayerId),
}

/// Ordered mapping of participant identity to per-room player record.
///
/// Insertion order is preserved and observable: the rules plugin assigns
/// roles by it and host promotion picks the earliest-joined survivor.
/// Rooms are small, so membership lookups scan the vector.
#[derive(Debug, Clone)]
pub struct PlayerSet {
    min_players: usize,
    max_players: usize,
    players: Vec<PlayerRecord>,
}

impl PlayerSet {
    pub fn new(min_players: usize, max_players: usize) -> Self {
        Self {
            min_players,
            max_players,
            players: Vec::new(),
        }
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| &p.id == id)
    }

    pub fn get(&self, id: &PlayerId) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn get_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerRecord> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Earliest-joined member, if any.
    pub fn first(&self) -> Option<&PlayerRecord> {
        self.players.first()
    }

    /// Insert a player at the tail. Idempotent: adding an id that is already
    /// present returns the existing record unchanged.
    pub fn add(&mut self, record: PlayerRecord) -> Result<PlayerRecord, PlayerSetError> {
        if let Some(existing) = self.get(&record.id) {
            return Ok(existing.clone());
        }
        if self.players.len() >= self.max_players {
            return Err(PlayerSetError::Full {
                max: self.max_players,
            });
        }
        self.players.push(record.clone());
        Ok(record)
    }

    /// Remove a player, preserving the order of survivors.
    pub fn remove(&mut self, id: &PlayerId) -> Option<PlayerRecord> {
        let index = self.players.iter().position(|p| &p.id == id)?;
        Some(self.players.remove(index))
    }

    pub fn set_ready(&mut self, id: &PlayerId, ready: bool) -> Result<PlayerRecord, PlayerSetError> {
        let record = self
            .get_mut(id)
            .ok_or_else(|| PlayerSetError::UnknownPlayer(id.clone()))?;
        record.is_ready = ready;
        Ok(record.clone())
    }

    /// Flip the ready flag and return its new value.
    pub fn toggle_ready(&mut self, id: &PlayerId) -> Result<bool, PlayerSetError> {
        let record = self
            .get_mut(id)
            .ok_or_else(|| PlayerSetError::UnknownPlayer(id.clone()))?;
        record.is_ready = !record.is_ready;
        Ok(record.is_ready)
    }

    /// True iff the room has at least `min_players` members and every member
    /// is ready.
    pub fn is_ready_to_start(&self) -> bool {
        self.players.len() >= self.min_players && self.players.iter().all(|p| p.is_ready)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter()
    }

    /// Ordered snapshot by join time.
    pub fn list(&self) -> Vec<PlayerRecord> {
        self.players.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> PlayerRecord {
        PlayerRecord::new(PlayerId::from(id), id.to_uppercase())
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut set = PlayerSet::new(2, 4);
        set.add(record("c")).unwrap();
        set.add(record("a")).unwrap();
        set.add(record("b")).unwrap();

        let order: Vec<&str> = set.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
        assert_eq!(set.first().unwrap().id.as_str(), "c");
    }

    #[test]
    fn add_is_idempotent() {
        let mut set = PlayerSet::new(2, 4);
        set.add(record("a")).unwrap();
        let mut duplicate = record("a");
        duplicate.display_name = "Other".to_string();

        let returned = set.add(duplicate).unwrap();
        assert_eq!(returned.display_name, "A");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn add_rejects_when_full() {
        let mut set = PlayerSet::new(2, 2);
        set.add(record("a")).unwrap();
        set.add(record("b")).unwrap();

        let err = set.add(record("c")).unwrap_err();
        assert_eq!(err, PlayerSetError::Full { max: 2 });
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn remove_preserves_survivor_order() {
        let mut set = PlayerSet::new(2, 4);
        for id in ["a", "b", "c"] {
            set.add(record(id)).unwrap();
        }

        let removed = set.remove(&PlayerId::from("b")).unwrap();
        assert_eq!(removed.id.as_str(), "b");

        let order: Vec<&str> = set.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["a", "c"]);
        assert!(set.remove(&PlayerId::from("b")).is_none());
    }

    #[test]
    fn ready_operations() {
        let mut set = PlayerSet::new(2, 4);
        set.add(record("a")).unwrap();

        assert!(set.toggle_ready(&PlayerId::from("a")).unwrap());
        assert!(!set.toggle_ready(&PlayerId::from("a")).unwrap());

        let record = set.set_ready(&PlayerId::from("a"), true).unwrap();
        assert!(record.is_ready);

        let err = set.toggle_ready(&PlayerId::from("ghost")).unwrap_err();
        assert!(matches!(err, PlayerSetError::UnknownPlayer(_)));
    }

    #[test]
    fn ready_to_start_requires_min_and_all_ready() {
        let mut set = PlayerSet::new(2, 4);
        set.add(record("a")).unwrap();
        set.set_ready(&PlayerId::from("a"), true).unwrap();
        assert!(!set.is_ready_to_start(), "below min_players");

        set.add(record("b")).unwrap();
        assert!(!set.is_ready_to_start(), "b is not ready");

        set.set_ready(&PlayerId::from("b"), true).unwrap();
        assert!(set.is_ready_to_start());
    }
}
