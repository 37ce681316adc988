use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::protocol::PlayerId;

use super::command_bus::ChangeContext;

/// Capacity of the per-container event channel. Subscribers that lag behind
/// this many events observe a `Lagged` error and must resynchronize from the
/// current state.
const STATE_EVENT_CAPACITY: usize = 64;

/// Authoritative state of one active game.
///
/// The envelope carries the fields every plugin exposes (turn marker,
/// terminal flag, winner); `data` is the plugin-defined payload and is
/// opaque to the rest of the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_player_id: Option<PlayerId>,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<serde_json::Value>,
    pub data: serde_json::Value,
}

impl GameState {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            current_player_id: None,
            round: 1,
            is_terminal: false,
            winner_id: None,
            winner_name: None,
            score: None,
            data,
        }
    }
}

/// Events published by a [`StateContainer`].
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// The authoritative state was replaced. `version` is strictly greater
    /// than that of every previously published `Changed` event.
    Changed {
        state: GameState,
        version: u64,
        context: Option<ChangeContext>,
    },
    /// A rules plugin surfaced a round boundary (scoreboard, winner name)
    /// without encoding it into the state blob.
    RoundEnd { payload: serde_json::Value },
}

/// Holds the current authoritative state for one active game together with a
/// strictly monotonic version counter and an event channel.
///
/// The container itself is not synchronized; callers access it under the
/// owning room's lock. Replacement is atomic with respect to observers
/// because observers only ever see published snapshots.
#[derive(Debug)]
pub struct StateContainer {
    state: GameState,
    version: u64,
    events: broadcast::Sender<StateEvent>,
}

impl StateContainer {
    pub fn new(initial: GameState) -> Self {
        let (events, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        Self {
            state: initial,
            version: 0,
            events,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Subscribe to state changes and round-end signals. A subscriber added
    /// mid-game receives events only from its subscription point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Replace the state, bump the version and publish `Changed`.
    /// Returns the new version.
    pub fn replace(&mut self, next: GameState, context: Option<ChangeContext>) -> u64 {
        self.version += 1;
        self.state = next;
        // Send errors only mean there is no live subscriber yet.
        let _ = self.events.send(StateEvent::Changed {
            state: self.state.clone(),
            version: self.version,
            context,
        });
        self.version
    }

    /// Publish a round-end signal without touching state or version.
    pub fn emit_round_end(&self, payload: serde_json::Value) {
        let _ = self.events.send(StateEvent::RoundEnd { payload });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(data: serde_json::Value) -> GameState {
        GameState::new(data)
    }

    #[test]
    fn version_starts_at_zero_and_increases() {
        let mut container = StateContainer::new(state(json!({"n": 0})));
        assert_eq!(container.version(), 0);

        let v1 = container.replace(state(json!({"n": 1})), None);
        let v2 = container.replace(state(json!({"n": 2})), None);
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
        assert_eq!(container.version(), 2);
    }

    #[tokio::test]
    async fn replace_publishes_changed_event() {
        let mut container = StateContainer::new(state(json!({"n": 0})));
        let mut rx = container.subscribe();

        container.replace(state(json!({"n": 1})), None);

        match rx.recv().await.unwrap() {
            StateEvent::Changed { state, version, .. } => {
                assert_eq!(version, 1);
                assert_eq!(state.data, json!({"n": 1}));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn round_end_does_not_bump_version() {
        let container = StateContainer::new(state(json!({})));
        let mut rx = container.subscribe();

        container.emit_round_end(json!({"winner": "a"}));
        assert_eq!(container.version(), 0);

        match rx.recv().await.unwrap() {
            StateEvent::RoundEnd { payload } => assert_eq!(payload, json!({"winner": "a"})),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn versions_observed_in_order() {
        let mut container = StateContainer::new(state(json!({"n": 0})));
        let mut rx = container.subscribe();

        for n in 1..=5 {
            container.replace(state(json!({ "n": n })), None);
        }

        let mut last = 0;
        for _ in 0..5 {
            if let StateEvent::Changed { version, .. } = rx.recv().await.unwrap() {
                assert!(version > last, "version {version} not greater than {last}");
                last = version;
            }
        }
    }
}
