use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::broadcast::{BroadcastMessage, BroadcastTarget};
use crate::metrics::ServerMetrics;
use crate::protocol::{PlayerId, ServerMessage};

#[derive(Debug, Error)]
pub enum RegisterClientError {
    #[error("Too many connections from your IP ({current}/{limit})")]
    IpLimitExceeded { current: usize, limit: usize },
    #[error("That identity is already connected")]
    AlreadyConnected,
}

#[derive(Debug)]
pub(crate) struct ClientConnection {
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    pub client_addr: SocketAddr,
    pub display_name: Option<String>,
    #[allow(dead_code)]
    pub connected_at: Instant,
}

/// Tracks live connections keyed by player id, with per-IP accounting.
///
/// A connection starts under a generated id; `identify` with a stable token
/// re-keys it so the player id survives reconnects.
pub(crate) struct ConnectionManager {
    clients: DashMap<PlayerId, ClientConnection>,
    connections_per_ip: DashMap<IpAddr, usize>,
    metrics: Arc<ServerMetrics>,
    max_connections_per_ip: usize,
}

impl ConnectionManager {
    pub fn new(max_connections_per_ip: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            connections_per_ip: DashMap::new(),
            metrics,
            max_connections_per_ip,
        }
    }

    pub fn register_client(
        &self,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) -> Result<PlayerId, RegisterClientError> {
        let ip = client_addr.ip();
        if let Err(current) = self.try_reserve_ip_slot(ip) {
            warn!(
                %ip,
                current,
                max = self.max_connections_per_ip,
                "IP connection limit exceeded"
            );
            return Err(RegisterClientError::IpLimitExceeded {
                current,
                limit: self.max_connections_per_ip,
            });
        }

        let player_id = PlayerId::generate();
        self.clients.insert(
            player_id.clone(),
            ClientConnection {
                sender,
                client_addr,
                display_name: None,
                connected_at: Instant::now(),
            },
        );
        self.metrics.increment_connections();
        Ok(player_id)
    }

    /// Register a connection under a caller-chosen id, bypassing the IP cap
    /// (integration tests hydrate server state this way).
    pub fn connect_test_client(
        &self,
        player_id: PlayerId,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        client_addr: SocketAddr,
    ) {
        self.connections_per_ip
            .entry(client_addr.ip())
            .and_modify(|count| *count += 1)
            .or_insert(1);
        self.clients.insert(
            player_id,
            ClientConnection {
                sender,
                client_addr,
                display_name: None,
                connected_at: Instant::now(),
            },
        );
        self.metrics.increment_connections();
    }

    /// Re-key a connection from its provisional id to a stable identity.
    pub fn rebind(&self, old: &PlayerId, new: &PlayerId) -> Result<(), RegisterClientError> {
        if old == new {
            return Ok(());
        }
        if self.clients.contains_key(new) {
            return Err(RegisterClientError::AlreadyConnected);
        }
        let Some((_, connection)) = self.clients.remove(old) else {
            return Ok(());
        };
        self.clients.insert(new.clone(), connection);
        Ok(())
    }

    pub fn set_display_name(&self, player_id: &PlayerId, name: String) {
        if let Some(mut connection) = self.clients.get_mut(player_id) {
            connection.display_name = Some(name);
        }
    }

    pub fn display_name(&self, player_id: &PlayerId) -> Option<String> {
        self.clients
            .get(player_id)
            .and_then(|conn| conn.display_name.clone())
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.clients.contains_key(player_id)
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    pub fn remove_client(&self, player_id: &PlayerId) -> Option<ClientConnection> {
        let (_, connection) = self.clients.remove(player_id)?;
        self.release_ip_slot(connection.client_addr.ip());
        self.metrics.decrement_active_connections();
        Some(connection)
    }

    pub fn send_to_player(&self, player_id: &PlayerId, message: Arc<ServerMessage>) {
        if let Some(connection) = self.clients.get(player_id) {
            if connection.sender.try_send(message).is_err() {
                self.metrics
                    .messages_dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                warn!(%player_id, "Failed to send message to client (queue full or closed)");
            }
        }
    }

    pub fn broadcast(&self, target: &BroadcastTarget, message: &BroadcastMessage) {
        for player_id in target.recipients() {
            self.send_to_player(player_id, message.arc_clone());
        }
    }

    pub fn broadcast_all(&self, message: &BroadcastMessage) {
        for entry in self.clients.iter() {
            if entry.value().sender.try_send(message.arc_clone()).is_err() {
                self.metrics
                    .messages_dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                warn!(player_id = %entry.key(), "Failed to broadcast message to client");
            }
        }
    }

    fn try_reserve_ip_slot(&self, ip: IpAddr) -> Result<(), usize> {
        let mut entry = self.connections_per_ip.entry(ip).or_insert(0);
        if *entry >= self.max_connections_per_ip {
            return Err(*entry);
        }
        *entry += 1;
        Ok(())
    }

    fn release_ip_slot(&self, ip: IpAddr) {
        if let Some(mut entry) = self.connections_per_ip.get_mut(&ip) {
            *entry = entry.saturating_sub(1);
        }
        self.connections_per_ip.remove_if(&ip, |_, count| *count == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_per_ip: usize) -> ConnectionManager {
        ConnectionManager::new(max_per_ip, Arc::new(ServerMetrics::new()))
    }

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 4000))
    }

    #[tokio::test]
    async fn register_send_and_remove() {
        let manager = manager(4);
        let (tx, mut rx) = mpsc::channel(8);

        let player_id = manager.register_client(tx, addr()).unwrap();
        assert!(manager.contains(&player_id));

        manager.send_to_player(
            &player_id,
            Arc::new(ServerMessage::error(
                "nope",
                crate::protocol::ErrorCode::Validation,
                None,
            )),
        );
        assert!(matches!(
            rx.recv().await.unwrap().as_ref(),
            ServerMessage::Error { .. }
        ));

        manager.remove_client(&player_id);
        assert!(!manager.contains(&player_id));
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn ip_limit_is_enforced_and_released() {
        let manager = manager(2);
        let (tx, _rx) = mpsc::channel(1);

        let a = manager.register_client(tx.clone(), addr()).unwrap();
        let _b = manager.register_client(tx.clone(), addr()).unwrap();
        let err = manager.register_client(tx.clone(), addr()).unwrap_err();
        assert!(matches!(
            err,
            RegisterClientError::IpLimitExceeded { current: 2, limit: 2 }
        ));

        manager.remove_client(&a);
        assert!(manager.register_client(tx, addr()).is_ok());
    }

    #[test]
    fn rebind_moves_the_connection_to_the_stable_id() {
        let manager = manager(4);
        let (tx, _rx) = mpsc::channel(1);

        let provisional = manager.register_client(tx, addr()).unwrap();
        manager.set_display_name(&provisional, "Ada".to_string());

        let stable = PlayerId::from("token-ada");
        manager.rebind(&provisional, &stable).unwrap();

        assert!(!manager.contains(&provisional));
        assert!(manager.contains(&stable));
        assert_eq!(manager.display_name(&stable).as_deref(), Some("Ada"));
    }

    #[test]
    fn rebind_refuses_a_live_target_identity() {
        let manager = manager(4);
        let (tx, _rx) = mpsc::channel(1);

        let a = manager.register_client(tx.clone(), addr()).unwrap();
        let b = manager.register_client(tx, addr()).unwrap();

        let err = manager.rebind(&a, &b).unwrap_err();
        assert!(matches!(err, RegisterClientError::AlreadyConnected));
        assert!(manager.contains(&a));
    }
}
