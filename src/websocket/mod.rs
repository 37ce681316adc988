//! WebSocket gateway: adapts the message-based transport to server calls.

pub mod connection;
mod sending;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::server::GameServer;

/// Build the HTTP router: `/ws` for the event protocol, `/metrics` for the
/// JSON metrics snapshot.
pub fn create_router(cors_origins: &str) -> Router<Arc<GameServer>> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics_handler))
        .layer(build_cors(cors_origins))
}

pub fn build_cors(cors_origins: &str) -> CorsLayer {
    if cors_origins == "*" {
        return CorsLayer::permissive();
    }

    let origins: Vec<_> = cors_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured, using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(server): State<Arc<GameServer>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, server, addr))
}

pub async fn metrics_handler(State(server): State<Arc<GameServer>>) -> impl IntoResponse {
    Json(server.metrics().snapshot())
}
