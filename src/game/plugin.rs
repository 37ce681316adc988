use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::protocol::{PlayerId, PlayerRecord, PluginDescriptor, RoomId};

use super::command_bus::CommandStrategy;
use super::state::GameState;

/// Context handed to a plugin when a game starts: the ordered player list
/// (join order, already carrying assigned display names) plus room metadata
/// and host-supplied start options.
#[derive(Debug, Clone)]
pub struct RoomContext {
    pub room_id: RoomId,
    pub players: Vec<PlayerRecord>,
    pub metadata: HashMap<String, String>,
    pub options: serde_json::Value,
}

/// Everything a plugin hands back from `create`: the initial authoritative
/// state, the strategy table keyed by command type, and the role each seated
/// player was assigned (e.g. `red`/`black`).
pub struct GameSetup {
    pub initial_state: GameState,
    pub strategies: HashMap<String, Arc<dyn CommandStrategy>>,
    pub roles: HashMap<PlayerId, String>,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("game requires between {min} and {max} players, got {actual}")]
    PlayerCount {
        min: usize,
        max: usize,
        actual: usize,
    },
    #[error("{0}")]
    Setup(String),
}

/// The polymorphism boundary for game rules.
///
/// A plugin is registered once per process and invoked exactly once per game
/// start. All turn logic lives in the returned strategies; the server never
/// inspects `GameState::data`.
pub trait GamePlugin: Send + Sync {
    fn descriptor(&self) -> PluginDescriptor;

    fn create(&self, ctx: &RoomContext) -> Result<GameSetup, PluginError>;
}
