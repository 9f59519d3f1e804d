use broadside::domain::{MatchStatus, Point};
use broadside::errors::ErrorCode;
use serde_json::json;

use crate::support::game_setup::{column_fleet, harness, move_msg, place_msg};

const ROOM: &str = "0f0f0f0f0f";

#[tokio::test]
async fn malformed_frames_are_reported_to_the_sender_only() {
    let h = harness();
    h.active_match(ROOM, "alice", "bob").await;
    h.notifier.clear();

    h.send(ROOM, "alice", "not json").await;
    h.send(ROOM, "alice", r#"{"type":"MOVE","payload":{"x":"one","y":2}}"#).await;
    h.send(ROOM, "alice", r#"{"type":"PLACE_SHIP"}"#).await;

    assert_eq!(
        h.notifier.error_codes("alice"),
        vec!["MALFORMED_PAYLOAD"; 3]
    );
    assert!(h.notifier.error_codes("bob").is_empty());
    assert!(h.notifier.room("MOVE").is_empty());
}

#[tokio::test]
async fn sender_must_match_the_connection() {
    let h = harness();
    h.active_match(ROOM, "alice", "bob").await;
    h.notifier.clear();

    let spoofed = json!({ "type": "MOVE", "sender": "bob", "payload": { "x": 1, "y": 0 } });
    let err = h
        .game
        .handle_message(ROOM, "alice", &spoofed.to_string())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::SenderMismatch);
    assert_eq!(h.notifier.error_codes("alice"), vec!["SENDER_MISMATCH"]);

    // A matching sender is accepted.
    let honest = json!({ "type": "MOVE", "sender": "alice", "payload": { "x": 1, "y": 0 } });
    h.game
        .handle_message(ROOM, "alice", &honest.to_string())
        .await
        .unwrap();
    assert_eq!(h.notifier.room("MOVE").len(), 1);
}

#[tokio::test]
async fn shot_rule_violations() {
    let h = harness();

    h.connect(ROOM, "alice").await;
    h.connect(ROOM, "bob").await;
    h.send(ROOM, "alice", &move_msg(0, 0)).await;
    assert_eq!(h.notifier.error_codes("alice"), vec!["NOT_ACTIVE"]);

    h.send(ROOM, "alice", &place_msg(&column_fleet(0))).await;
    h.send(ROOM, "bob", &place_msg(&column_fleet(1))).await;
    h.notifier.clear();

    h.send(ROOM, "bob", &move_msg(0, 0)).await;
    h.send(ROOM, "alice", &move_msg(5, 0)).await;
    h.send(ROOM, "alice", &move_msg(-1, 0)).await;

    assert_eq!(h.notifier.error_codes("bob"), vec!["NOT_YOUR_TURN"]);
    assert_eq!(
        h.notifier.error_codes("alice"),
        vec!["OUT_OF_BOUNDS", "OUT_OF_BOUNDS"]
    );

    let state = h.state(ROOM).await;
    assert_eq!(state.active_player, "alice");
    assert!(h.notifier.room("MOVE").is_empty());
}

#[tokio::test]
async fn placement_rule_violations_leave_the_board_untouched() {
    let h = harness();
    h.connect(ROOM, "alice").await;
    h.connect(ROOM, "bob").await;
    h.notifier.clear();

    let short = &column_fleet(0)[..4];
    let mut overlapping = column_fleet(0);
    overlapping[4] = Point::new(0, 0);
    let mut outside = column_fleet(0);
    outside[2] = Point::new(9, 9);

    h.send(ROOM, "alice", &place_msg(short)).await;
    h.send(ROOM, "alice", &place_msg(&overlapping)).await;
    h.send(ROOM, "alice", &place_msg(&outside)).await;

    assert_eq!(
        h.notifier.error_codes("alice"),
        vec!["WRONG_SHIP_COUNT", "OVERLAPPING_SHIPS", "OUT_OF_BOUNDS"]
    );
    let state = h.state(ROOM).await;
    assert!(!state.has_placed("alice"));
    assert_eq!(
        state
            .board("alice")
            .unwrap()
            .count(broadside::domain::CellState::Ship),
        0
    );

    h.send(ROOM, "alice", &place_msg(&column_fleet(0))).await;
    h.send(ROOM, "alice", &place_msg(&column_fleet(2))).await;
    assert_eq!(
        h.notifier.error_codes("alice").last().map(String::as_str),
        Some("SHIPS_ALREADY_PLACED")
    );

    h.send(ROOM, "bob", &place_msg(&column_fleet(1))).await;
    assert_eq!(h.state(ROOM).await.status, MatchStatus::Active);
}

#[tokio::test]
async fn moves_against_a_missing_match_are_not_found() {
    let h = harness();
    h.connect(ROOM, "alice").await;

    let err = h
        .game
        .handle_message(ROOM, "alice", &move_msg(0, 0))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::GameNotFound);
    assert_eq!(h.notifier.error_codes("alice"), vec!["GAME_NOT_FOUND"]);
}

#[tokio::test]
async fn errors_do_not_reach_disconnected_players() {
    let h = harness();
    // No presence recorded for "ghost"; the report has nowhere to go.
    let err = h
        .game
        .handle_message(ROOM, "ghost", "{}")
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MalformedPayload);
    assert!(h.notifier.all().is_empty());
}
