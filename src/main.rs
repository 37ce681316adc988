#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use parlor_server::config;
use parlor_server::game::PluginRegistry;
use parlor_server::games::CheckersPlugin;
use parlor_server::logging;
use parlor_server::monitor::ResourceMonitor;
use parlor_server::repository::InMemoryStateRepository;
use parlor_server::server::{GameServer, ServerConfig};
use parlor_server::websocket;

/// Parlor -- in-memory WebSocket server for turn-based multiplayer matches
#[derive(Parser, Debug)]
#[command(name = "parlor-server")]
#[command(about = "An in-memory WebSocket server hosting turn-based multiplayer matches")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() already validated warn-only; here the result decides
    // the exit code.
    let validation_result =
        config::validate_config(&cfg).map_err(|e| anyhow::anyhow!("Configuration invalid:\n{e}"));

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {} (scanning up to {} ports)", cfg.port, cfg.port_scan_limit);
                println!("  Sweep interval: {}s", cfg.server.sweep_interval);
                println!("  Disconnect grace: {}s", cfg.server.disconnect_grace);
                println!("  Idle room timeout: {}s", cfg.server.idle_room_timeout);
                println!("  Room id prefix: {}", cfg.server.room_id_prefix);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    // Register the bundled rules plugins. Re-registration of a game id is a
    // startup bug, hence the propagated error.
    let registry = Arc::new(PluginRegistry::new());
    registry
        .register(Arc::new(CheckersPlugin))
        .map_err(|e| anyhow::anyhow!("Plugin registration failed: {e}"))?;

    let repository = Arc::new(InMemoryStateRepository::new());
    let server = GameServer::new(
        ServerConfig::from_config(&cfg),
        cfg.protocol.clone(),
        registry,
        repository,
    );

    // Background machinery: janitor sweep, coalescing lobby broadcaster,
    // registry watcher, resource monitor.
    tokio::spawn(server.clone().sweep_task());
    tokio::spawn(server.clone().lobby_broadcast_task());
    tokio::spawn(server.clone().registry_watch_task());
    let monitor = ResourceMonitor::new(
        server.clone(),
        tokio::time::Duration::from_secs(cfg.metrics.sample_interval),
    );
    monitor.spawn();

    let router = websocket::create_router(&cfg.security.cors_origins)
        .fallback(|| async {
            "Parlor Server. Use /ws for the WebSocket protocol, /metrics for metrics."
        })
        .with_state(server);

    // Preferred port first, then scan upward until a free one is found.
    let listener = bind_first_free_port(cfg.port, cfg.port_scan_limit).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Server started - WebSocket protocol: /ws, Metrics: /metrics");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn bind_first_free_port(
    preferred: u16,
    scan_limit: u16,
) -> anyhow::Result<tokio::net::TcpListener> {
    for offset in 0..scan_limit {
        let Some(port) = preferred.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!(
                        preferred,
                        chosen = port,
                        "Preferred port was busy; scanned upward"
                    );
                }
                return Ok(listener);
            }
            Err(err) => {
                tracing::debug!(port, error = %err, "Port unavailable, trying next");
            }
        }
    }
    anyhow::bail!("no free port found in range {preferred}..{}", preferred.saturating_add(scan_limit))
}
