use axum::extract::ws::{Message, WebSocket};
use futures_util::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::server::{GameServer, RegisterClientError};

use super::sending::{send_immediate_server_message, send_loop};

/// Outbound queue depth per connection. A client that cannot drain this many
/// messages is dropped rather than allowed to stall broadcasts.
const OUTBOUND_QUEUE_CAPACITY: usize = 64;

pub async fn handle_socket(socket: WebSocket, server: Arc<GameServer>, addr: SocketAddr) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Arc<ServerMessage>>(OUTBOUND_QUEUE_CAPACITY);

    let player_id = match server.register_client(tx, addr) {
        Ok(player_id) => {
            tracing::info!(%player_id, client_addr = %addr, "WebSocket connection established");
            player_id
        }
        Err(err @ RegisterClientError::IpLimitExceeded { .. }) => {
            let error_message = ServerMessage::error(
                err.to_string(),
                ErrorCode::TooManyConnections,
                None,
            );
            if let Err(send_err) = send_immediate_server_message(&mut sender, &error_message).await
            {
                tracing::debug!(client_addr = %addr, error = %send_err, "Failed to send IP limit error frame");
            }
            let _ = futures_util::SinkExt::close(&mut sender).await;
            return;
        }
        Err(err) => {
            tracing::warn!(client_addr = %addr, error = %err, "Failed to register connection");
            let _ = futures_util::SinkExt::close(&mut sender).await;
            return;
        }
    };

    // Every connection is a room-list subscriber from the moment it
    // attaches: current plugin catalog plus the list snapshot at the
    // current version.
    server.send_to_player(
        &player_id,
        ServerMessage::AvailableGames {
            games: server.registry().list(),
        },
    );
    let room_list = server.room_list_message_current().await;
    server.send_to_player(&player_id, room_list);

    let send_task = tokio::spawn(send_loop(sender, rx, player_id.clone()));

    // Inbound handling is sequential per connection, so a client cannot race
    // its own messages. `current_id` tracks identify re-keying.
    let mut current_id = player_id;
    while let Some(frame) = receiver.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(player_id = %current_id, "WebSocket error: {}", err);
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let max_size = server.config().max_message_size;
                if text.len() > max_size {
                    tracing::warn!(
                        player_id = %current_id,
                        size = text.len(),
                        max = max_size,
                        "Message exceeds size limit"
                    );
                    server.send_error_to_player(
                        &current_id,
                        format!("Message too large ({} bytes, max {max_size} bytes)", text.len()),
                        ErrorCode::MessageTooLarge,
                        None,
                    );
                    continue;
                }

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => {
                        server
                            .handle_client_message(&mut current_id, client_message)
                            .await;
                    }
                    Err(err) => {
                        let (code, reply) = classify_parse_error(&err);
                        tracing::debug!(player_id = %current_id, error = %err, "Rejected client frame");
                        server.send_error_to_player(&current_id, reply, code, None);
                    }
                }
            }
            Message::Close(_) => break,
            // Axum answers pings automatically; binary frames are not part
            // of this protocol.
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    server.handle_disconnect(&current_id).await;
    // Removing the connection dropped its sender, which ends the send loop.
    let _ = send_task.await;
    tracing::info!(player_id = %current_id, client_addr = %addr, "WebSocket connection closed");
}

/// Unknown event names get `unknown_event`; everything else is a payload
/// shape failure.
fn classify_parse_error(err: &serde_json::Error) -> (ErrorCode, String) {
    let text = err.to_string();
    if text.contains("unknown variant") {
        (
            ErrorCode::UnknownEvent,
            "Unknown event name".to_string(),
        )
    } else {
        (
            ErrorCode::Validation,
            "Malformed message payload".to_string(),
        )
    }
}
