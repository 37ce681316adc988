//! Per-player rate limiting for room operations.
//!
//! Fixed-window counters keyed by player id: a window tracks both room
//! creations and total join attempts (creations count as joins). Rejections
//! are surfaced as `error{code=rate_limited}` and logged as security events.

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

use crate::protocol::PlayerId;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of room creation requests per time window
    pub max_room_creations: u32,
    /// Time window for rate limiting
    pub time_window: Duration,
    /// Maximum number of join attempts per time window (including creations)
    pub max_join_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_room_creations: 5,
            time_window: Duration::from_secs(60),
            max_join_attempts: 20,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Room creation limit exceeded, retry in {retry_after:?}")]
    RoomCreationLimitExceeded { retry_after: Duration },
    #[error("Join attempt limit exceeded, retry in {retry_after:?}")]
    JoinLimitExceeded { retry_after: Duration },
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    room_creations: u32,
    join_attempts: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            room_creations: 0,
            join_attempts: 0,
            window_start: Instant::now(),
        }
    }

    fn maybe_reset_window(&mut self, config: &RateLimitConfig) {
        if self.window_start.elapsed() >= config.time_window {
            self.room_creations = 0;
            self.join_attempts = 0;
            self.window_start = Instant::now();
        }
    }

    fn try_room_creation(&mut self, config: &RateLimitConfig) -> bool {
        self.maybe_reset_window(config);
        if self.room_creations < config.max_room_creations {
            self.room_creations += 1;
            self.join_attempts += 1;
            true
        } else {
            false
        }
    }

    fn try_join_attempt(&mut self, config: &RateLimitConfig) -> bool {
        self.maybe_reset_window(config);
        if self.join_attempts < config.max_join_attempts {
            self.join_attempts += 1;
            true
        } else {
            false
        }
    }

    fn time_until_reset(&self, config: &RateLimitConfig) -> Duration {
        config.time_window.saturating_sub(self.window_start.elapsed())
    }
}

/// Rate limiter for room operations.
pub struct RoomRateLimiter {
    config: RateLimitConfig,
    entries: RwLock<HashMap<PlayerId, RateLimitEntry>>,
}

impl RoomRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn check_room_creation(&self, player_id: &PlayerId) -> Result<(), RateLimitError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(player_id.clone())
            .or_insert_with(RateLimitEntry::new);

        if entry.try_room_creation(&self.config) {
            Ok(())
        } else {
            Err(RateLimitError::RoomCreationLimitExceeded {
                retry_after: entry.time_until_reset(&self.config),
            })
        }
    }

    pub async fn check_join_attempt(&self, player_id: &PlayerId) -> Result<(), RateLimitError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(player_id.clone())
            .or_insert_with(RateLimitEntry::new);

        if entry.try_join_attempt(&self.config) {
            Ok(())
        } else {
            Err(RateLimitError::JoinLimitExceeded {
                retry_after: entry.time_until_reset(&self.config),
            })
        }
    }

    /// Drop entries whose window lies entirely in the past. Called from the
    /// janitor sweep.
    pub async fn cleanup_old_entries(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.window_start.elapsed() < self.config.time_window);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_creations: u32, max_joins: u32) -> RoomRateLimiter {
        RoomRateLimiter::new(RateLimitConfig {
            max_room_creations: max_creations,
            time_window: Duration::from_secs(60),
            max_join_attempts: max_joins,
        })
    }

    #[tokio::test]
    async fn room_creations_are_capped_per_window() {
        let limiter = limiter(2, 10);
        let player = PlayerId::from("ada");

        assert!(limiter.check_room_creation(&player).await.is_ok());
        assert!(limiter.check_room_creation(&player).await.is_ok());
        let err = limiter.check_room_creation(&player).await.unwrap_err();
        assert!(matches!(
            err,
            RateLimitError::RoomCreationLimitExceeded { .. }
        ));

        // Other players are unaffected.
        assert!(limiter.check_room_creation(&PlayerId::from("ben")).await.is_ok());
    }

    #[tokio::test]
    async fn creations_count_toward_the_join_budget() {
        let limiter = limiter(5, 3);
        let player = PlayerId::from("ada");

        assert!(limiter.check_room_creation(&player).await.is_ok());
        assert!(limiter.check_join_attempt(&player).await.is_ok());
        assert!(limiter.check_join_attempt(&player).await.is_ok());
        let err = limiter.check_join_attempt(&player).await.unwrap_err();
        assert!(matches!(err, RateLimitError::JoinLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn cleanup_drops_expired_windows_only() {
        let expired = RoomRateLimiter::new(RateLimitConfig {
            max_room_creations: 5,
            time_window: Duration::ZERO,
            max_join_attempts: 5,
        });
        let _ = expired.check_join_attempt(&PlayerId::from("ada")).await;
        assert_eq!(expired.cleanup_old_entries().await, 1);

        let fresh = limiter(5, 5);
        let _ = fresh.check_join_attempt(&PlayerId::from("ada")).await;
        assert_eq!(fresh.cleanup_old_entries().await, 0);
    }
}
