use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::watch;

use crate::protocol::{GameId, PluginDescriptor};

use super::plugin::GamePlugin;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a plugin is already registered for `{0}`")]
    AlreadyRegistered(GameId),
}

/// In-memory catalog of available rules plugins keyed by game id.
///
/// Append-only during normal operation: plugins register once at load and
/// re-registration with the same id is an error. Listing returns a snapshot;
/// the watch channel lets the gateway re-announce `availableGames` when the
/// catalog changes.
pub struct PluginRegistry {
    plugins: RwLock<HashMap<GameId, Arc<dyn GamePlugin>>>,
    changes: watch::Sender<u64>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            plugins: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub fn register(&self, plugin: Arc<dyn GamePlugin>) -> Result<(), RegistryError> {
        let game_id = plugin.descriptor().game_id;
        {
            let mut plugins = self
                .plugins
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if plugins.contains_key(&game_id) {
                return Err(RegistryError::AlreadyRegistered(game_id));
            }
            plugins.insert(game_id.clone(), plugin);
        }

        self.changes.send_modify(|generation| *generation += 1);
        tracing::info!(game_id = %game_id, "Registered rules plugin");
        Ok(())
    }

    pub fn get(&self, game_id: &GameId) -> Option<Arc<dyn GamePlugin>> {
        self.plugins
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(game_id)
            .cloned()
    }

    pub fn contains(&self, game_id: &GameId) -> bool {
        self.plugins
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(game_id)
    }

    /// Snapshot of all registered plugin descriptors, ordered by game id.
    pub fn list(&self) -> Vec<PluginDescriptor> {
        let mut descriptors: Vec<PluginDescriptor> = self
            .plugins
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(|plugin| plugin.descriptor())
            .collect();
        descriptors.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.plugins
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe catalog changes. The value is a generation counter.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::plugin::{GameSetup, PluginError, RoomContext};
    use crate::game::state::GameState;
    use std::collections::HashMap;

    struct StubPlugin {
        id: &'static str,
    }

    impl GamePlugin for StubPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            PluginDescriptor {
                game_id: GameId::from(self.id),
                name: self.id.to_string(),
                min_players: 2,
                max_players: 4,
                category: "test".to_string(),
            }
        }

        fn create(&self, _ctx: &RoomContext) -> Result<GameSetup, PluginError> {
            Ok(GameSetup {
                initial_state: GameState::new(serde_json::json!({})),
                strategies: HashMap::new(),
                roles: HashMap::new(),
            })
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(StubPlugin { id: "war" })).unwrap();

        assert!(registry.contains(&GameId::from("war")));
        assert!(registry.get(&GameId::from("war")).is_some());
        assert!(registry.get(&GameId::from("hearts")).is_none());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(StubPlugin { id: "war" })).unwrap();

        let err = registry
            .register(Arc::new(StubPlugin { id: "war" }))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(id) if id.as_str() == "war"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn list_is_sorted_by_game_id() {
        let registry = PluginRegistry::new();
        registry.register(Arc::new(StubPlugin { id: "war" })).unwrap();
        registry
            .register(Arc::new(StubPlugin { id: "checkers" }))
            .unwrap();
        registry
            .register(Arc::new(StubPlugin { id: "hearts" }))
            .unwrap();

        let descriptors = registry.list();
        let ids: Vec<&str> = descriptors.iter().map(|d| d.game_id.as_str()).collect();
        assert_eq!(ids, vec!["checkers", "hearts", "war"]);
    }

    #[test]
    fn registration_notifies_subscribers() {
        let registry = PluginRegistry::new();
        let rx = registry.subscribe_changes();
        assert_eq!(*rx.borrow(), 0);

        registry.register(Arc::new(StubPlugin { id: "war" })).unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
