use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{PlayerId, ServerMessage};

/// Serialize and send one message outside the normal outbound queue (used
/// before the connection is registered).
pub(super) async fn send_immediate_server_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(text) => sender.send(Message::Text(text.into())).await,
        Err(err) => {
            tracing::error!(error = %err, "Failed to serialize server message");
            Ok(())
        }
    }
}

/// Drain the outbound queue into the socket until either side closes.
pub(super) async fn send_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Arc<ServerMessage>>,
    player_id: PlayerId,
) {
    while let Some(message) = rx.recv().await {
        let text = match serde_json::to_string(message.as_ref()) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(%player_id, error = %err, "Failed to serialize outbound message");
                continue;
            }
        };
        if sender.send(Message::Text(text.into())).await.is_err() {
            tracing::debug!(%player_id, "Outbound socket closed mid-send");
            break;
        }
    }
    let _ = sender.close().await;
}
