use dashmap::DashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Duration;
use uuid::Uuid;

use crate::broadcast::{BroadcastMessage, BroadcastTarget, PlayerIdList};
use crate::game::PluginRegistry;
use crate::metrics::ServerMetrics;
use crate::protocol::{ErrorCode, PlayerId, RoomId, ServerMessage};
use crate::rate_limit::{RateLimitConfig, RoomRateLimiter};
use crate::repository::StateRepository;
use crate::room::Room;

mod connection_manager;
mod game_service;
mod lobby;
mod maintenance;
mod message_router;
mod ready_state;
mod reconnection_service;
mod room_service;

#[cfg(test)]
mod game_service_tests;
#[cfg(test)]
mod message_router_tests;
#[cfg(test)]
pub(crate) mod test_support;

use connection_manager::ConnectionManager;
pub use connection_manager::RegisterClientError;
pub use game_service::GameServiceError;
pub use reconnection_service::IdentifyError;
pub use room_service::RoomServiceError;

fn chrono_duration_from_std(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX))
}

/// Runtime server configuration, converted from the loaded config file.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub sweep_interval: Duration,
    pub disconnect_grace: Duration,
    pub idle_room_timeout: Duration,
    pub start_guard_window: Duration,
    pub room_closing_delay: Duration,
    pub room_id_prefix: String,
    pub max_rooms: usize,
    pub max_message_size: usize,
    pub max_connections_per_ip: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            disconnect_grace: Duration::from_secs(300),
            idle_room_timeout: Duration::from_secs(1800),
            start_guard_window: Duration::from_millis(2000),
            room_closing_delay: Duration::from_secs(1),
            room_id_prefix: crate::protocol::DEFAULT_ROOM_ID_PREFIX.to_string(),
            max_rooms: 1000,
            max_message_size: 65536,
            max_connections_per_ip: 10,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self {
            sweep_interval: Duration::from_secs(cfg.server.sweep_interval),
            disconnect_grace: Duration::from_secs(cfg.server.disconnect_grace),
            idle_room_timeout: Duration::from_secs(cfg.server.idle_room_timeout),
            start_guard_window: Duration::from_millis(cfg.server.start_guard_window_ms),
            room_closing_delay: Duration::from_secs(cfg.server.room_closing_delay),
            room_id_prefix: cfg.server.room_id_prefix.clone(),
            max_rooms: cfg.server.max_rooms,
            max_message_size: cfg.security.max_message_size,
            max_connections_per_ip: cfg.security.max_connections_per_ip,
            rate_limit: RateLimitConfig {
                max_room_creations: cfg.rate_limit.max_room_creations,
                time_window: Duration::from_secs(cfg.rate_limit.time_window),
                max_join_attempts: cfg.rate_limit.max_join_attempts,
            },
        }
    }
}

/// The room, command-dispatch, and broadcast engine.
///
/// Owns all rooms keyed by room id. Every mutating operation on a room runs
/// under that room's async mutex, which serializes operations in arrival
/// order while letting different rooms proceed in parallel. The
/// `memberships` map is the authoritative player-to-room lookup; connections
/// never carry their own room pointer.
pub struct GameServer {
    registry: Arc<PluginRegistry>,
    repository: Arc<dyn StateRepository>,
    connection_manager: ConnectionManager,
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
    memberships: DashMap<PlayerId, RoomId>,
    config: ServerConfig,
    protocol_config: crate::config::ProtocolConfig,
    rate_limiter: RoomRateLimiter,
    pub(crate) metrics: Arc<ServerMetrics>,
    /// Process-wide monotonic version for `updateRoomList` broadcasts.
    room_list_version: AtomicU64,
    /// Wakes the coalescing lobby broadcaster after room-graph changes.
    lobby_notify: Notify,
    /// Back-reference for spawning tasks from `&self` methods.
    self_ref: Weak<GameServer>,
    instance_id: Uuid,
}

impl GameServer {
    pub fn new(
        config: ServerConfig,
        protocol_config: crate::config::ProtocolConfig,
        registry: Arc<PluginRegistry>,
        repository: Arc<dyn StateRepository>,
    ) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        let connection_manager =
            ConnectionManager::new(config.max_connections_per_ip, metrics.clone());
        let rate_limiter = RoomRateLimiter::new(config.rate_limit.clone());

        Arc::new_cyclic(|self_ref| Self {
            registry,
            repository,
            connection_manager,
            rooms: DashMap::new(),
            memberships: DashMap::new(),
            config,
            protocol_config,
            rate_limiter,
            metrics,
            room_list_version: AtomicU64::new(0),
            lobby_notify: Notify::new(),
            self_ref: self_ref.clone(),
            instance_id: Uuid::new_v4(),
        })
    }

    /// Upgrade the self-reference for task spawning. Only fails during
    /// teardown, when spawning new work is pointless anyway.
    pub(crate) fn shared(&self) -> Option<Arc<Self>> {
        self.self_ref.upgrade()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn protocol_config(&self) -> &crate::config::ProtocolConfig {
        &self.protocol_config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &dyn StateRepository {
        self.repository.as_ref()
    }

    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Register a new client connection.
    pub fn register_client(
        &self,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: std::net::SocketAddr,
    ) -> Result<PlayerId, RegisterClientError> {
        let player_id = self
            .connection_manager
            .register_client(sender, client_addr)?;
        tracing::info!(%player_id, %client_addr, instance_id = %self.instance_id, "Client registered");
        Ok(player_id)
    }

    /// Connect a client with a specific player id (used by tests).
    pub fn connect_test_client(
        &self,
        player_id: PlayerId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
    ) {
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
        self.connection_manager
            .connect_test_client(player_id, sender, addr);
    }

    pub fn is_connected(&self, player_id: &PlayerId) -> bool {
        self.connection_manager.contains(player_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connection_manager.connection_count()
    }

    pub fn display_name(&self, player_id: &PlayerId) -> Option<String> {
        self.connection_manager.display_name(player_id)
    }

    /// Authoritative player-to-room lookup.
    pub fn get_player_room(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.memberships
            .get(player_id)
            .map(|entry| entry.value().clone())
    }

    pub(crate) fn room(&self, room_id: &RoomId) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Room/player/game counts for the resource monitor. Uses `try_lock` so
    /// sampling never blocks a busy room; contested rooms are counted by
    /// membership only.
    pub fn resource_stats(&self) -> ResourceStats {
        let rooms = self.rooms.len();
        let mut players = 0;
        let mut active_games = 0;
        for entry in self.rooms.iter() {
            match entry.value().try_lock() {
                Ok(room) => {
                    players += room.players.len();
                    if room.game.is_some() {
                        active_games += 1;
                    }
                }
                Err(_) => {
                    players += self
                        .memberships
                        .iter()
                        .filter(|m| m.value() == entry.key())
                        .count();
                }
            }
        }
        ResourceStats {
            rooms,
            players,
            active_games,
        }
    }

    pub(crate) fn send_to_player(&self, player_id: &PlayerId, message: ServerMessage) {
        self.connection_manager
            .send_to_player(player_id, Arc::new(message));
    }

    pub(crate) fn send_error_to_player(
        &self,
        player_id: &PlayerId,
        message: impl Into<String>,
        code: ErrorCode,
        action: Option<&str>,
    ) {
        self.send_to_player(player_id, ServerMessage::error(message, code, action));
    }

    pub(crate) fn broadcast(&self, target: &BroadcastTarget, message: BroadcastMessage) {
        self.metrics
            .room_events_broadcast
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.connection_manager.broadcast(target, &message);
    }

    pub(crate) fn broadcast_to_members(&self, members: PlayerIdList, message: ServerMessage) {
        self.broadcast(
            &BroadcastTarget::room(members),
            BroadcastMessage::new(message),
        );
    }

    pub(crate) fn broadcast_all(&self, message: ServerMessage) {
        self.connection_manager
            .broadcast_all(&BroadcastMessage::new(message));
    }
}

/// Counts sampled by the resource monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStats {
    pub rooms: usize,
    pub players: usize,
    pub active_games: usize,
}
