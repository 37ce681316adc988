use serde_json::json;

use super::test_support::{connect, playing_room, test_server};
use crate::protocol::{ClientMessage, ErrorCode, GameMode, PlayerId, ServerMessage};

#[tokio::test]
async fn identify_rebinds_to_the_supplied_token() {
    let server = test_server();
    let mut client = connect(&server, "conn-1", "Placeholder").await;
    let mut current = client.id.clone();

    server
        .handle_client_message(
            &mut current,
            ClientMessage::Identify {
                username: "  Ada   Lovelace ".to_string(),
                player_token: Some("token-ada".to_string()),
            },
        )
        .await;

    assert_eq!(current, PlayerId::from("token-ada"));
    assert!(server.is_connected(&current));
    assert!(!server.is_connected(&client.id));
    assert_eq!(
        server.display_name(&current).as_deref(),
        Some("Ada Lovelace"),
        "display name is sanitized"
    );
    client.assert_no_queued(|m| matches!(m, ServerMessage::Error { .. }));
}

#[tokio::test]
async fn invalid_display_name_is_answered_with_a_validation_error() {
    let server = test_server();
    let mut client = connect(&server, "conn-1", "Placeholder").await;
    let mut current = client.id.clone();

    server
        .handle_client_message(
            &mut current,
            ClientMessage::Identify {
                username: "bad@name".to_string(),
                player_token: None,
            },
        )
        .await;

    match client
        .recv_matching(|m| matches!(m, ServerMessage::Error { .. }))
        .await
    {
        ServerMessage::Error { code, action, .. } => {
            assert_eq!(code, ErrorCode::Validation);
            assert_eq!(action.as_deref(), Some("identify"));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn join_game_normalizes_invite_codes() {
    let server = test_server();
    let carol = connect(&server, "carol", "Carol").await;
    let mut dave = connect(&server, "dave", "Dave").await;

    server
        .create_room(&carol.id, "checkers", GameMode::P2p, Some("WIZARD"))
        .await
        .unwrap();

    let mut dave_id = dave.id.clone();
    server
        .handle_client_message(&mut dave_id, ClientMessage::JoinGame(" wiz-ard ".to_string()))
        .await;

    match dave
        .recv_matching(|m| matches!(m, ServerMessage::JoinedMatchLobby { .. }))
        .await
    {
        ServerMessage::JoinedMatchLobby { room, .. } => {
            assert_eq!(room.room_id.as_str(), "WIZARD");
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn create_game_errors_carry_the_action_name() {
    let server = test_server();
    let mut client = connect(&server, "ada", "Ada").await;
    let mut current = client.id.clone();

    server
        .handle_client_message(
            &mut current,
            ClientMessage::CreateGame {
                game_type: "go".to_string(),
                mode: GameMode::Lan,
                room_code: None,
            },
        )
        .await;

    match client
        .recv_matching(|m| matches!(m, ServerMessage::Error { .. }))
        .await
    {
        ServerMessage::Error { code, action, .. } => {
            assert_eq!(code, ErrorCode::UnknownGame);
            assert_eq!(action.as_deref(), Some("createGame"));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn ready_toggle_is_silently_ignored_while_playing() {
    let (server, mut ada, _ben, room_id) = playing_room().await;
    let mut ada_id = ada.id.clone();

    server
        .handle_client_message(&mut ada_id, ClientMessage::PlayerReady)
        .await;

    tokio::task::yield_now().await;
    ada.assert_no_queued(|m| {
        matches!(m, ServerMessage::Error { .. }) || matches!(m, ServerMessage::RoomStateUpdate { .. })
    });

    // The flag itself is untouched.
    let room_arc = server.room(&room_id).unwrap();
    let room = room_arc.lock().await;
    assert!(room.players.get(&ada_id).unwrap().is_ready);
}

#[tokio::test]
async fn leave_game_without_a_room_reports_not_in_room() {
    let server = test_server();
    let mut client = connect(&server, "ada", "Ada").await;
    let mut current = client.id.clone();

    server
        .handle_client_message(&mut current, ClientMessage::LeaveGame)
        .await;

    match client
        .recv_matching(|m| matches!(m, ServerMessage::Error { .. }))
        .await
    {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotInRoom),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn submit_move_rejection_reaches_only_the_offender() {
    let (server, mut ada, mut ben, _room_id) = playing_room().await;
    let mut ben_id = ben.id.clone();

    server
        .handle_client_message(
            &mut ben_id,
            ClientMessage::SubmitMove(json!({
                "type": "move",
                "from": {"x": 0, "y": 5},
                "to": {"x": 1, "y": 4},
            })),
        )
        .await;

    match ben
        .recv_matching(|m| matches!(m, ServerMessage::Error { .. }))
        .await
    {
        ServerMessage::Error { message, code, action } => {
            assert_eq!(code, ErrorCode::RulesRejection);
            assert_eq!(message, "not your turn");
            assert_eq!(action.as_deref(), Some("submitMove"));
        }
        other => panic!("unexpected message: {other:?}"),
    }

    tokio::task::yield_now().await;
    ada.assert_no_queued(|m| {
        matches!(m, ServerMessage::Error { .. })
            || matches!(m, ServerMessage::GameStateUpdate { .. })
    });

    // Latency for the inbound event was recorded.
    assert!(server
        .metrics()
        .latency_percentiles(crate::metrics::OP_INBOUND)
        .is_some());
}
