use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Latency histogram bounds: 1 microsecond to 5 minutes, 3 significant
/// figures.
const LOWEST_DISCERNIBLE_MICROS: u64 = 1;
const HIGHEST_TRACKABLE_MICROS: u64 = 300_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

/// Operation label for inbound event handling latency.
pub const OP_INBOUND: &str = "inbound_event";
/// Operation label for outbound event processing latency.
pub const OP_OUTBOUND: &str = "outbound_event";

/// Metrics collection for the in-memory game server.
///
/// Counters are lock-free atomics; latency percentiles sit behind a small
/// RwLock'd histogram map keyed by operation.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub messages_dropped: AtomicU64,

    // Room lifecycle metrics
    pub rooms_created: AtomicU64,
    pub rooms_joined: AtomicU64,
    pub rooms_deleted: AtomicU64,
    pub room_creation_failures: AtomicU64,
    pub room_join_failures: AtomicU64,

    // Game metrics
    pub games_started: AtomicU64,
    pub commands_dispatched: AtomicU64,
    pub commands_rejected: AtomicU64,
    pub undo_operations: AtomicU64,

    // Broadcast metrics
    pub room_list_broadcasts: AtomicU64,
    pub room_events_broadcast: AtomicU64,

    // Disconnect-grace metrics
    pub grace_entries_added: AtomicU64,
    pub grace_reconnections: AtomicU64,
    pub grace_expirations: AtomicU64,

    // Sweep metrics
    pub idle_rooms_swept: AtomicU64,

    // Error tracking
    pub validation_errors: AtomicU64,
    pub internal_errors: AtomicU64,
    pub repository_save_failures: AtomicU64,
    pub rate_limit_rejections: AtomicU64,

    latency: LatencyTracker,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            rooms_created: AtomicU64::new(0),
            rooms_joined: AtomicU64::new(0),
            rooms_deleted: AtomicU64::new(0),
            room_creation_failures: AtomicU64::new(0),
            room_join_failures: AtomicU64::new(0),
            games_started: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            undo_operations: AtomicU64::new(0),
            room_list_broadcasts: AtomicU64::new(0),
            room_events_broadcast: AtomicU64::new(0),
            grace_entries_added: AtomicU64::new(0),
            grace_reconnections: AtomicU64::new(0),
            grace_expirations: AtomicU64::new(0),
            idle_rooms_swept: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            repository_save_failures: AtomicU64::new(0),
            rate_limit_rejections: AtomicU64::new(0),
            latency: LatencyTracker::new(),
        }
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        self.disconnections.fetch_add(1, Ordering::Relaxed);
        // Saturating decrement; unregistering twice must not wrap.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn record_latency(&self, operation: &'static str, elapsed: Duration) {
        self.latency.record(operation, elapsed);
    }

    pub fn latency_percentiles(&self, operation: &str) -> Option<LatencyPercentiles> {
        self.latency.percentiles(operation)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connections: ConnectionMetrics {
                total_connections: load(&self.total_connections),
                active_connections: load(&self.active_connections),
                disconnections: load(&self.disconnections),
                messages_dropped: load(&self.messages_dropped),
            },
            rooms: RoomMetrics {
                rooms_created: load(&self.rooms_created),
                rooms_joined: load(&self.rooms_joined),
                rooms_deleted: load(&self.rooms_deleted),
                room_creation_failures: load(&self.room_creation_failures),
                room_join_failures: load(&self.room_join_failures),
            },
            games: GameMetrics {
                games_started: load(&self.games_started),
                commands_dispatched: load(&self.commands_dispatched),
                commands_rejected: load(&self.commands_rejected),
                undo_operations: load(&self.undo_operations),
            },
            broadcasts: BroadcastMetrics {
                room_list_broadcasts: load(&self.room_list_broadcasts),
                room_events_broadcast: load(&self.room_events_broadcast),
            },
            grace: GraceMetrics {
                grace_entries_added: load(&self.grace_entries_added),
                grace_reconnections: load(&self.grace_reconnections),
                grace_expirations: load(&self.grace_expirations),
                idle_rooms_swept: load(&self.idle_rooms_swept),
            },
            errors: ErrorMetrics {
                validation_errors: load(&self.validation_errors),
                internal_errors: load(&self.internal_errors),
                repository_save_failures: load(&self.repository_save_failures),
                rate_limit_rejections: load(&self.rate_limit_rejections),
            },
            latency: self.latency.all_percentiles(),
        }
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling latency percentiles per operation.
#[derive(Debug)]
struct LatencyTracker {
    histograms: RwLock<HashMap<&'static str, Histogram<u64>>>,
}

impl LatencyTracker {
    fn new() -> Self {
        Self {
            histograms: RwLock::new(HashMap::new()),
        }
    }

    fn record(&self, operation: &'static str, elapsed: Duration) {
        let micros = (elapsed.as_micros() as u64).clamp(
            LOWEST_DISCERNIBLE_MICROS,
            HIGHEST_TRACKABLE_MICROS,
        );
        let mut histograms = self
            .histograms
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let histogram = match histograms.entry(operation) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let Ok(histogram) = Histogram::new_with_bounds(
                    LOWEST_DISCERNIBLE_MICROS,
                    HIGHEST_TRACKABLE_MICROS,
                    SIGNIFICANT_FIGURES,
                ) else {
                    // Drop the sample rather than fail the caller.
                    return;
                };
                entry.insert(histogram)
            }
        };
        let _ = histogram.record(micros);
    }

    fn percentiles(&self, operation: &str) -> Option<LatencyPercentiles> {
        let histograms = self
            .histograms
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let histogram = histograms.get(operation)?;
        if histogram.is_empty() {
            return None;
        }
        Some(LatencyPercentiles {
            p50_micros: histogram.value_at_quantile(0.50),
            p95_micros: histogram.value_at_quantile(0.95),
            p99_micros: histogram.value_at_quantile(0.99),
            samples: histogram.len(),
        })
    }

    fn all_percentiles(&self) -> HashMap<String, LatencyPercentiles> {
        let histograms = self
            .histograms
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        histograms
            .iter()
            .filter(|(_, h)| !h.is_empty())
            .map(|(op, h)| {
                (
                    (*op).to_string(),
                    LatencyPercentiles {
                        p50_micros: h.value_at_quantile(0.50),
                        p95_micros: h.value_at_quantile(0.95),
                        p99_micros: h.value_at_quantile(0.99),
                        samples: h.len(),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_micros: u64,
    pub p95_micros: u64,
    pub p99_micros: u64,
    pub samples: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connections: ConnectionMetrics,
    pub rooms: RoomMetrics,
    pub games: GameMetrics,
    pub broadcasts: BroadcastMetrics,
    pub grace: GraceMetrics,
    pub errors: ErrorMetrics,
    pub latency: HashMap<String, LatencyPercentiles>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub messages_dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMetrics {
    pub rooms_created: u64,
    pub rooms_joined: u64,
    pub rooms_deleted: u64,
    pub room_creation_failures: u64,
    pub room_join_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetrics {
    pub games_started: u64,
    pub commands_dispatched: u64,
    pub commands_rejected: u64,
    pub undo_operations: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastMetrics {
    pub room_list_broadcasts: u64,
    pub room_events_broadcast: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraceMetrics {
    pub grace_entries_added: u64,
    pub grace_reconnections: u64,
    pub grace_expirations: u64,
    pub idle_rooms_swept: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub validation_errors: u64,
    pub internal_errors: u64,
    pub repository_save_failures: u64,
    pub rate_limit_rejections: u64,
}
