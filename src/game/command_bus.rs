use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::protocol::PlayerId;
use crate::room::PlayerSet;

use super::state::{GameState, StateContainer};

/// A client-submitted command, normalized at the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescriptor {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub player_id: PlayerId,
}

impl CommandDescriptor {
    /// Build a descriptor from a raw inbound payload. The `type` field is
    /// extracted and removed; everything else remains the strategy payload.
    pub fn from_payload(
        player_id: PlayerId,
        mut payload: serde_json::Value,
    ) -> Result<Self, CommandError> {
        let command_type = payload
            .as_object_mut()
            .and_then(|map| map.remove("type"))
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or(CommandError::MissingType)?;

        Ok(Self {
            command_type,
            payload,
            player_id,
        })
    }
}

/// What produced a state replacement. Carried on `stateChanged` events so
/// subscribers can distinguish forward commands from undo replacements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeContext {
    Command { descriptor: CommandDescriptor },
    Undo { descriptor: CommandDescriptor },
}

/// Reverses the game-visible effect of a command by producing the state to
/// replace the current one with.
pub type UndoFn = Box<dyn FnOnce() -> GameState + Send>;

/// Result of a strategy evaluation.
///
/// Strategies never mutate their input; a legal command yields the explicit
/// next state (and usually an undo), an illegal one yields a rejection with
/// no state change.
pub enum CommandOutcome {
    Rejected {
        reason: String,
    },
    Applied {
        next_state: GameState,
        undo: Option<UndoFn>,
        /// Round boundary payload to surface after the state is replaced.
        round_end: Option<serde_json::Value>,
    },
}

impl fmt::Debug for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => f.debug_struct("Rejected").field("reason", reason).finish(),
            Self::Applied {
                next_state,
                undo,
                round_end,
            } => f
                .debug_struct("Applied")
                .field("next_state", next_state)
                .field("has_undo", &undo.is_some())
                .field("round_end", round_end)
                .finish(),
        }
    }
}

/// Inputs handed to a strategy. Borrowed views only; the strategy must not
/// retain them.
pub struct CommandContext<'a> {
    pub state: &'a GameState,
    pub players: &'a PlayerSet,
    pub player_id: &'a PlayerId,
    pub payload: &'a serde_json::Value,
}

/// A pure evaluator for one command type. Given identical inputs it must
/// produce identical outcomes.
pub trait CommandStrategy: Send + Sync {
    fn execute(&self, ctx: CommandContext<'_>) -> CommandOutcome;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command is missing a `type` field")]
    MissingType,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("{0}")]
    Rejected(String),
    #[error("the game has already finished")]
    GameAlreadyOver,
    #[error("nothing to undo")]
    UndoEmpty,
    #[error("only the player who issued the last command may undo it")]
    UndoNotOwner,
}

struct UndoRecord {
    descriptor: CommandDescriptor,
    undo: UndoFn,
}

/// Per-room command dispatcher.
///
/// Owned by the room and only touched under the room lock, which serializes
/// dispatches in arrival order.
pub struct CommandBus {
    strategies: HashMap<String, Arc<dyn CommandStrategy>>,
    undo_stack: Vec<UndoRecord>,
}

impl CommandBus {
    pub fn new(strategies: HashMap<String, Arc<dyn CommandStrategy>>) -> Self {
        Self {
            strategies,
            undo_stack: Vec::new(),
        }
    }

    pub fn has_strategy(&self, command_type: &str) -> bool {
        self.strategies.contains_key(command_type)
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Apply one command against the container. On success the container's
    /// version has increased by exactly one and the new version is returned.
    /// On any error both state and version are untouched.
    pub fn dispatch(
        &mut self,
        container: &mut StateContainer,
        players: &PlayerSet,
        descriptor: CommandDescriptor,
    ) -> Result<u64, CommandError> {
        if container.state().is_terminal {
            return Err(CommandError::GameAlreadyOver);
        }

        let strategy = self
            .strategies
            .get(&descriptor.command_type)
            .cloned()
            .ok_or_else(|| CommandError::UnknownCommand(descriptor.command_type.clone()))?;

        let outcome = strategy.execute(CommandContext {
            state: container.state(),
            players,
            player_id: &descriptor.player_id,
            payload: &descriptor.payload,
        });

        match outcome {
            CommandOutcome::Rejected { reason } => Err(CommandError::Rejected(reason)),
            CommandOutcome::Applied {
                next_state,
                undo,
                round_end,
            } => {
                let context = ChangeContext::Command {
                    descriptor: descriptor.clone(),
                };
                let version = container.replace(next_state, Some(context));
                if let Some(undo) = undo {
                    self.undo_stack.push(UndoRecord { descriptor, undo });
                }
                if let Some(payload) = round_end {
                    container.emit_round_end(payload);
                }
                Ok(version)
            }
        }
    }

    /// Undo the most recent undoable command.
    ///
    /// Undo is not a version rewind: the reversed state is applied as a
    /// forward replacement, so the version still increases. When
    /// `player_id` is given it must match the issuer of the popped command.
    pub fn undo_last(
        &mut self,
        container: &mut StateContainer,
        player_id: Option<&PlayerId>,
    ) -> Result<u64, CommandError> {
        let record = self.undo_stack.pop().ok_or(CommandError::UndoEmpty)?;

        if let Some(requester) = player_id {
            if *requester != record.descriptor.player_id {
                self.undo_stack.push(record);
                return Err(CommandError::UndoNotOwner);
            }
        }

        let prior = (record.undo)();
        let context = ChangeContext::Undo {
            descriptor: record.descriptor,
        };
        Ok(container.replace(prior, Some(context)))
    }
}
