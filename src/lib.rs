#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # Parlor Server
//!
//! An in-memory WebSocket server hosting short-lived turn-based multiplayer
//! matches. Clients connect, are placed into named rooms, ready up, and play
//! a game whose rules come from a pluggable module; every state transition
//! is a server-side rules evaluation of a client command, pushed back out to
//! the room's subscribers with a strictly monotonic version.
//!
//! No database, no cloud services. Just run the binary and connect via
//! WebSocket.

/// Broadcast fan-out primitives
pub mod broadcast;

/// Server configuration and environment variables
pub mod config;

/// Game engine: state container, command bus, plugin registry
pub mod game;

/// Bundled rules plugins (Checkers reference implementation)
pub mod games;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Resource monitor (room/player counts, process usage)
pub mod monitor;

/// Wire protocol: message types, validation, identifiers
pub mod protocol;

/// Rate limiting for room operations
pub mod rate_limit;

/// Game state snapshot persistence (in-memory default)
pub mod repository;

/// Room aggregate and player set
pub mod room;

/// Main server orchestration: room manager, services, sweeps
pub mod server;

/// WebSocket connection handling
pub mod websocket;
