use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling.
///
/// Serialized in `snake_case` so clients can switch on the wire value
/// (`rules_rejection`, `unknown_event`, ...).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Payload shape / charset failures
    Validation,
    MessageTooLarge,
    UnknownEvent,

    // Lookup failures
    NotFound,
    UnknownGame,
    UnknownPlayer,

    // State conflicts
    Conflict,
    AlreadyInRoom,
    NotInRoom,
    RoomClosing,
    GameAlreadyStarting,

    // Capacity
    Capacity,

    // Permission
    Authorization,
    UndoNotOwner,

    // Rules evaluation
    RulesRejection,
    UnknownCommand,
    GameNotActive,
    GameAlreadyOver,
    UndoEmpty,

    // Connection policing
    TooManyConnections,
    RateLimited,

    // Server faults
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => {
                "The provided input is invalid or malformed. Check your request parameters."
            }
            Self::MessageTooLarge => {
                "The message size exceeds the maximum allowed limit. Please send a smaller message."
            }
            Self::UnknownEvent => {
                "The event name is not recognized by this server. Check the protocol version."
            }
            Self::NotFound => {
                "The requested room could not be found. It may have been closed or the code is incorrect."
            }
            Self::UnknownGame => {
                "No rules plugin is registered under that game id."
            }
            Self::UnknownPlayer => {
                "That player is not a member of the room."
            }
            Self::Conflict => {
                "The room is in a state that does not permit this operation."
            }
            Self::AlreadyInRoom => {
                "You are already in a room. Leave the current room before joining another."
            }
            Self::NotInRoom => {
                "You are not currently in any room. Join a room before performing this action."
            }
            Self::RoomClosing => {
                "The room is shutting down and no longer accepts joins."
            }
            Self::GameAlreadyStarting => {
                "A start request for this room is already in flight."
            }
            Self::Capacity => {
                "The room has reached its player capacity, or has too few players to start."
            }
            Self::Authorization => {
                "Only the room host may perform this operation."
            }
            Self::UndoNotOwner => {
                "Only the player who issued the last command may undo it."
            }
            Self::RulesRejection => {
                "The rules plugin rejected the command."
            }
            Self::UnknownCommand => {
                "The command type is not registered by the active rules plugin."
            }
            Self::GameNotActive => {
                "No game is currently running in this room."
            }
            Self::GameAlreadyOver => {
                "The game has already finished; no further commands are accepted."
            }
            Self::UndoEmpty => {
                "There is nothing to undo."
            }
            Self::TooManyConnections => {
                "You have too many active connections. Close some connections before opening new ones."
            }
            Self::RateLimited => {
                "Too many requests in a short time. Please slow down and try again later."
            }
            Self::InternalError => {
                "An internal server error occurred. Please try again or contact support if the issue persists."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_error_codes_have_descriptions() {
        let error_codes = [
            ErrorCode::Validation,
            ErrorCode::MessageTooLarge,
            ErrorCode::UnknownEvent,
            ErrorCode::NotFound,
            ErrorCode::UnknownGame,
            ErrorCode::UnknownPlayer,
            ErrorCode::Conflict,
            ErrorCode::AlreadyInRoom,
            ErrorCode::NotInRoom,
            ErrorCode::RoomClosing,
            ErrorCode::GameAlreadyStarting,
            ErrorCode::Capacity,
            ErrorCode::Authorization,
            ErrorCode::UndoNotOwner,
            ErrorCode::RulesRejection,
            ErrorCode::UnknownCommand,
            ErrorCode::GameNotActive,
            ErrorCode::GameAlreadyOver,
            ErrorCode::UndoEmpty,
            ErrorCode::TooManyConnections,
            ErrorCode::RateLimited,
            ErrorCode::InternalError,
        ];

        for error_code in &error_codes {
            let description = error_code.description();
            assert!(
                description.len() > 10,
                "ErrorCode::{:?} has suspiciously short description: '{}'",
                error_code,
                description
            );
        }
    }

    #[test]
    fn serialization_uses_snake_case() {
        let json = serde_json::to_string(&ErrorCode::RulesRejection).unwrap();
        assert_eq!(json, "\"rules_rejection\"");
        let json = serde_json::to_string(&ErrorCode::UnknownEvent).unwrap();
        assert_eq!(json, "\"unknown_event\"");
        let json = serde_json::to_string(&ErrorCode::GameAlreadyStarting).unwrap();
        assert_eq!(json, "\"game_already_starting\"");
    }
}
