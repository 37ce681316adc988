// Protocol module: message types, validation, and identifier handling.

pub mod error_codes;
pub mod messages;
pub mod room_codes;
pub mod types;
pub mod validation;

// Re-export everything for convenience; external code uses
// `use crate::protocol::*`-style imports.

pub use error_codes::ErrorCode;

pub use types::{
    GameId, GameMode, PlayerId, PlayerRecord, PluginDescriptor, RoomId, RoomPhase, RoomSnapshot,
    RoomSummary, DEFAULT_MAX_DISPLAY_NAME_CHARS, DEFAULT_MAX_GAME_TYPE_LENGTH,
    DEFAULT_MAX_INVITE_CODE_LENGTH, DEFAULT_MIN_INVITE_CODE_LENGTH, DEFAULT_ROOM_ID_PREFIX,
};

pub use messages::{ClientMessage, ServerMessage};

#[cfg(test)]
mod tests {
    use super::room_codes;
    use super::validation::{sanitize_display_name, validate_account_name, validate_game_type};
    use super::*;
    use crate::config::ProtocolConfig;
    use proptest::prelude::*;

    #[test]
    fn display_name_is_nfkc_normalized_and_collapsed() {
        let config = ProtocolConfig::default();

        // Fullwidth letters normalize to ASCII under NFKC.
        assert_eq!(
            sanitize_display_name("Ａｄａ", &config).unwrap(),
            "Ada"
        );
        // Whitespace runs collapse; edges are trimmed.
        assert_eq!(
            sanitize_display_name("  Ada   Lovelace \t ", &config).unwrap(),
            "Ada Lovelace"
        );
        // Permitted symbols survive.
        assert_eq!(
            sanitize_display_name("O'Brien-Núñez Jr.", &config).unwrap(),
            "O'Brien-Núñez Jr."
        );
        assert_eq!(
            sanitize_display_name("J\u{2019}son", &config).unwrap(),
            "J\u{2019}son"
        );
    }

    #[test]
    fn display_name_rejections() {
        let config = ProtocolConfig::default();

        assert!(sanitize_display_name("", &config).is_err());
        assert!(sanitize_display_name("   ", &config).is_err());
        assert!(sanitize_display_name("Bad@Name", &config).is_err());
        assert!(sanitize_display_name("emoji🐟", &config).is_err());
        assert!(sanitize_display_name(&"x".repeat(25), &config).is_err());
        assert!(sanitize_display_name(&"x".repeat(24), &config).is_ok());
    }

    #[test]
    fn account_name_validation() {
        assert!(validate_account_name("ada_lovelace").is_ok());
        assert!(validate_account_name("Ab-3").is_ok());
        assert!(validate_account_name("ab").is_err());
        assert!(validate_account_name(&"a".repeat(25)).is_err());
        assert!(validate_account_name("bad name").is_err());
        assert!(validate_account_name("bad!name").is_err());
    }

    #[test]
    fn game_type_validation() {
        let config = ProtocolConfig::default();

        assert!(validate_game_type("checkers", &config).is_ok());
        assert!(validate_game_type("laser-tag_2", &config).is_ok());
        assert!(validate_game_type("", &config).is_err());
        assert!(validate_game_type(&"g".repeat(51), &config).is_err());
        assert!(validate_game_type("no spaces", &config).is_err());
    }

    #[test]
    fn invite_code_normalization() {
        let config = ProtocolConfig::default();

        assert_eq!(
            room_codes::normalize_invite_code("wizard", &config).unwrap(),
            "WIZARD"
        );
        assert_eq!(
            room_codes::normalize_invite_code(" wi-za rd7 ", &config).unwrap(),
            "WIZARD7"
        );
        // Too short after stripping.
        assert!(room_codes::normalize_invite_code("a-!", &config).is_err());
        // Too long.
        assert!(room_codes::normalize_invite_code("ABCDEFGHIJK", &config).is_err());
        assert!(room_codes::normalize_invite_code("", &config).is_err());
    }

    #[test]
    fn generated_room_ids_match_the_documented_form() {
        let id = room_codes::generate_room_id("room");
        assert!(
            room_codes::is_generated_room_id(id.as_str()),
            "generated id `{id}` does not match the expected form"
        );

        assert!(room_codes::is_generated_room_id("room_0a1b2c3d"));
        assert!(room_codes::is_generated_room_id("Match_ABCDEF01"));
        assert!(!room_codes::is_generated_room_id("room_0a1b2c"));
        assert!(!room_codes::is_generated_room_id("room2_0a1b2c3d"));
        assert!(!room_codes::is_generated_room_id("WIZARD"));
    }

    #[test]
    fn generated_room_ids_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..100 {
            seen.insert(room_codes::generate_room_id("room").as_str().to_string());
        }
        assert!(seen.len() > 90);
    }

    #[test]
    fn client_message_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"createGame","data":{"gameType":"checkers","mode":"lan"}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::CreateGame { ref game_type, mode: GameMode::Lan, room_code: None }
                if game_type == "checkers"
        ));

        // movePiece is accepted as an alias for submitMove.
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"movePiece","data":{"type":"move"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::SubmitMove(_)));

        // Unit variants need no payload.
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"playerReady"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::PlayerReady));

        // Unknown events fail to parse (and are answered with unknown_event).
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"fly"}"#).is_err());
    }

    #[test]
    fn server_error_wire_format() {
        let msg = ServerMessage::error("not your turn", ErrorCode::RulesRejection, Some("submitMove"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["code"], "rules_rejection");
        assert_eq!(json["data"]["action"], "submitMove");
    }

    fn expected_game_type_ok(name: &str, config: &ProtocolConfig) -> bool {
        !name.is_empty()
            && name.len() <= config.max_game_type_length
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn expected_invite_code(raw: &str, config: &ProtocolConfig) -> Option<String> {
        let cleaned: String = raw
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect();
        if cleaned.len() >= config.invite_code_min_length
            && cleaned.len() <= config.invite_code_max_length
        {
            Some(cleaned)
        } else {
            None
        }
    }

    proptest! {
        #[test]
        fn game_type_validation_matches_predicate(raw in proptest::collection::vec(any::<char>(), 0..=64)) {
            let candidate: String = raw.into_iter().collect();
            let config = ProtocolConfig::default();
            prop_assert_eq!(
                validate_game_type(&candidate, &config).is_ok(),
                expected_game_type_ok(&candidate, &config)
            );
        }

        #[test]
        fn invite_code_normalization_matches_predicate(raw in proptest::collection::vec(any::<char>(), 0..=16)) {
            let candidate: String = raw.into_iter().collect();
            let config = ProtocolConfig::default();
            prop_assert_eq!(
                room_codes::normalize_invite_code(&candidate, &config).ok(),
                expected_invite_code(&candidate, &config)
            );
        }

        #[test]
        fn sanitized_display_names_always_satisfy_the_charset(raw in proptest::collection::vec(any::<char>(), 0..=40)) {
            let candidate: String = raw.into_iter().collect();
            let config = ProtocolConfig::default();
            if let Ok(name) = sanitize_display_name(&candidate, &config) {
                prop_assert!(!name.is_empty());
                prop_assert!(name.chars().count() <= config.max_display_name_chars);
                prop_assert!(name.trim() == name);
                prop_assert!(!name.contains("  "));
                for ch in name.chars() {
                    prop_assert!(
                        ch == ' '
                            || ch.is_alphabetic()
                            || ch.is_numeric()
                            || ['_', '\'', '\u{2019}', '.', '-'].contains(&ch),
                        "unexpected character in sanitized display name"
                    );
                }
            }
        }
    }
}
