//! Resource monitor: periodic sampling of room/player counts and process
//! resource usage, published as `serverMetrics` samples.
//!
//! The monitor runs on its own task and never blocks the room scheduler:
//! room counts come from `try_lock` sampling and process stats from
//! `sysinfo`. A failed sample degrades to zeros instead of failing the task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::{broadcast, RwLock};
use tokio::time::Duration;

use crate::metrics::{LatencyPercentiles, OP_INBOUND, OP_OUTBOUND};
use crate::server::GameServer;

const SAMPLE_CHANNEL_CAPACITY: usize = 16;

/// One `serverMetrics` observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub rooms: usize,
    pub active_games: usize,
    pub players: usize,
    pub connections: usize,
    pub process_memory_bytes: u64,
    pub load_average_1m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_latency: Option<LatencyPercentiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_latency: Option<LatencyPercentiles>,
}

pub struct ResourceMonitor {
    server: Arc<GameServer>,
    interval: Duration,
    samples: broadcast::Sender<ResourceSample>,
    latest: RwLock<Option<ResourceSample>>,
}

impl ResourceMonitor {
    pub fn new(server: Arc<GameServer>, interval: Duration) -> Arc<Self> {
        let (samples, _) = broadcast::channel(SAMPLE_CHANNEL_CAPACITY);
        Arc::new(Self {
            server,
            interval,
            samples,
            latest: RwLock::new(None),
        })
    }

    /// Subscribe to the `serverMetrics` sample stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceSample> {
        self.samples.subscribe()
    }

    pub async fn latest(&self) -> Option<ResourceSample> {
        self.latest.read().await.clone()
    }

    /// Spawn the sampling loop.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        loop {
            interval.tick().await;
            let sample = self.take_sample(&mut system, pid);

            tracing::debug!(
                rooms = sample.rooms,
                active_games = sample.active_games,
                players = sample.players,
                connections = sample.connections,
                process_memory_bytes = sample.process_memory_bytes,
                load_average_1m = sample.load_average_1m,
                "serverMetrics"
            );

            *self.latest.write().await = Some(sample.clone());
            // No subscribers is fine.
            let _ = self.samples.send(sample);
        }
    }

    fn take_sample(&self, system: &mut System, pid: Pid) -> ResourceSample {
        let stats = self.server.resource_stats();

        // Process stats can fail (procfs races, sandboxing); degrade to zero.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process_memory_bytes = system.process(pid).map(|p| p.memory()).unwrap_or_else(|| {
            tracing::debug!("Process memory sample unavailable");
            0
        });
        let load_average_1m = System::load_average().one;

        let metrics = self.server.metrics();
        ResourceSample {
            timestamp: Utc::now(),
            rooms: stats.rooms,
            active_games: stats.active_games,
            players: stats.players,
            connections: self.server.connection_count(),
            process_memory_bytes,
            load_average_1m,
            inbound_latency: metrics.latency_percentiles(OP_INBOUND),
            outbound_latency: metrics.latency_percentiles(OP_OUTBOUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PluginRegistry;
    use crate::repository::InMemoryStateRepository;
    use crate::server::ServerConfig;

    #[tokio::test]
    async fn take_sample_reports_counts_without_blocking() {
        let server = GameServer::new(
            ServerConfig::default(),
            crate::config::ProtocolConfig::default(),
            Arc::new(PluginRegistry::new()),
            Arc::new(InMemoryStateRepository::new()),
        );
        let monitor = ResourceMonitor::new(server, Duration::from_secs(3));

        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());
        let sample = monitor.take_sample(&mut system, pid);

        assert_eq!(sample.rooms, 0);
        assert_eq!(sample.players, 0);
        assert_eq!(sample.active_games, 0);
        // Serializes for consumers either way.
        let json = serde_json::to_value(&sample).unwrap();
        assert!(json.get("processMemoryBytes").is_some());
    }
}
