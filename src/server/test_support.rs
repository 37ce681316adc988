//! Shared fixtures for the server service tests: an in-process server with
//! the Checkers plugin registered, and channel-backed test connections.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::game::PluginRegistry;
use crate::games::CheckersPlugin;
use crate::protocol::{PlayerId, ServerMessage};
use crate::repository::InMemoryStateRepository;

use super::{GameServer, ServerConfig};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct TestClient {
    pub id: PlayerId,
    pub rx: mpsc::Receiver<Arc<ServerMessage>>,
}

impl TestClient {
    /// Drop everything queued so far.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push((*message).clone());
        }
        out
    }

    pub async fn recv(&mut self) -> ServerMessage {
        let message = tokio::time::timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for a server message")
            .expect("connection channel closed");
        (*message).clone()
    }

    /// Skip messages until one satisfies the predicate.
    pub async fn recv_matching(
        &mut self,
        mut predicate: impl FnMut(&ServerMessage) -> bool,
    ) -> ServerMessage {
        loop {
            let message = self.recv().await;
            if predicate(&message) {
                return message;
            }
        }
    }

    /// Assert that nothing matching the predicate is currently queued.
    pub fn assert_no_queued(&mut self, mut predicate: impl FnMut(&ServerMessage) -> bool) {
        for message in self.drain() {
            assert!(
                !predicate(&message),
                "unexpected queued message: {message:?}"
            );
        }
    }
}

pub(crate) fn test_server() -> Arc<GameServer> {
    test_server_with(ServerConfig::default())
}

pub(crate) fn test_server_with(config: ServerConfig) -> Arc<GameServer> {
    let registry = Arc::new(PluginRegistry::new());
    registry
        .register(Arc::new(CheckersPlugin))
        .expect("checkers registers once");
    GameServer::new(
        config,
        crate::config::ProtocolConfig::default(),
        registry,
        Arc::new(InMemoryStateRepository::new()),
    )
}

/// Attach a channel-backed connection under `id` and identify it.
pub(crate) async fn connect(server: &Arc<GameServer>, id: &str, name: &str) -> TestClient {
    connect_with_token(server, id, name, None).await
}

pub(crate) async fn connect_with_token(
    server: &Arc<GameServer>,
    id: &str,
    name: &str,
    token: Option<&str>,
) -> TestClient {
    let (tx, rx) = mpsc::channel(256);
    server.connect_test_client(PlayerId::from(id), tx);
    let id = server
        .identify(&PlayerId::from(id), name, token)
        .await
        .expect("identify succeeds");
    TestClient { id, rx }
}

/// Drive a room to the Playing phase: Ada hosts, Ben joins, both ready,
/// Ada starts. Returns (server, ada, ben, room_id).
pub(crate) async fn playing_room() -> (
    Arc<GameServer>,
    TestClient,
    TestClient,
    crate::protocol::RoomId,
) {
    let server = test_server();
    let mut ada = connect(&server, "ada", "Ada").await;
    let mut ben = connect(&server, "ben", "Ben").await;

    let room_id = server
        .create_room(&ada.id, "checkers", crate::protocol::GameMode::Lan, None)
        .await
        .expect("create succeeds");
    server
        .join_room(&room_id, &ben.id)
        .await
        .expect("join succeeds");
    server.toggle_ready(&ben.id).await.expect("ready succeeds");
    server.start_game(&ada.id).await.expect("start succeeds");

    ada.drain();
    ben.drain();
    (server, ada, ben, room_id)
}
