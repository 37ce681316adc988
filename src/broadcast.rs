//! Broadcast primitives for fanning one message out to many connections.
//!
//! Messages are wrapped in `Arc` once at the emit site; fanning out to N
//! subscribers clones the pointer, not the payload.

use smallvec::SmallVec;
use std::sync::Arc;

use crate::protocol::{PlayerId, ServerMessage};

/// Maximum number of members a typical room holds; member-id snapshots up to
/// this size stay on the stack.
pub const TYPICAL_ROOM_SIZE: usize = 8;

/// List of player IDs optimized for typical room sizes.
pub type PlayerIdList = SmallVec<[PlayerId; TYPICAL_ROOM_SIZE]>;

/// A broadcast-optimized message wrapper.
#[derive(Debug, Clone)]
pub struct BroadcastMessage {
    inner: Arc<ServerMessage>,
}

impl BroadcastMessage {
    #[inline]
    pub fn new(message: ServerMessage) -> Self {
        Self {
            inner: Arc::new(message),
        }
    }

    #[inline]
    pub fn message(&self) -> &ServerMessage {
        &self.inner
    }

    /// Clone just the Arc (zero-cost).
    #[inline]
    pub fn arc_clone(&self) -> Arc<ServerMessage> {
        self.inner.clone()
    }
}

impl From<ServerMessage> for BroadcastMessage {
    fn from(msg: ServerMessage) -> Self {
        Self::new(msg)
    }
}

impl AsRef<ServerMessage> for BroadcastMessage {
    fn as_ref(&self) -> &ServerMessage {
        &self.inner
    }
}

/// Broadcast target specification.
#[derive(Debug, Clone)]
pub enum BroadcastTarget {
    /// Send to all listed players.
    Room { players: PlayerIdList },
    /// Send to all listed players except one.
    RoomExcept {
        players: PlayerIdList,
        except: PlayerId,
    },
    /// Send to a specific player.
    Player(PlayerId),
}

impl BroadcastTarget {
    pub fn room(players: impl IntoIterator<Item = PlayerId>) -> Self {
        Self::Room {
            players: players.into_iter().collect(),
        }
    }

    pub fn room_except(players: impl IntoIterator<Item = PlayerId>, except: PlayerId) -> Self {
        Self::RoomExcept {
            players: players.into_iter().collect(),
            except,
        }
    }

    /// Iterate over recipient player ids.
    pub fn recipients(&self) -> impl Iterator<Item = &PlayerId> {
        let (players, except): (&[PlayerId], Option<&PlayerId>) = match self {
            Self::Room { players } => (players.as_slice(), None),
            Self::RoomExcept { players, except } => (players.as_slice(), Some(except)),
            Self::Player(id) => (std::slice::from_ref(id), None),
        };
        players.iter().filter(move |id| Some(*id) != except)
    }

    pub fn recipient_count(&self) -> usize {
        self.recipients().count()
    }
}
