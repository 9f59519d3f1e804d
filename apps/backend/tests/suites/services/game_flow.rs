use broadside::domain::{CellState, MatchStatus, Point};
use broadside::store::keys::TimerKey;
use broadside::store::CoordinationStore;
use serde_json::json;

use crate::support::game_setup::{chat_msg, column_fleet, harness, move_msg, place_msg};

const ROOM: &str = "a1b2c3d4e5";

#[tokio::test]
async fn full_match_from_join_to_win() {
    let h = harness();

    h.connect(ROOM, "alice").await;
    assert_eq!(
        h.notifier.solo("alice", "GAME_UPDATE"),
        vec![json!({ "message": "waiting for an opponent to join" })]
    );
    assert!(h.repo.get(ROOM).await.unwrap().is_none());

    h.connect(ROOM, "bob").await;
    let state = h.state(ROOM).await;
    assert_eq!(state.players, ["alice".to_string(), "bob".to_string()]);
    assert_eq!(state.status, MatchStatus::WaitingForShips);
    assert!(state.end_at.is_some());
    assert_eq!(
        h.notifier.room_updates(),
        vec!["opponent joined, place your ships"]
    );
    for player in ["alice", "bob"] {
        let views = h.notifier.solo(player, "GAME_STATE");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0]["status"], "WAITING_FOR_SHIPS");
    }
    assert!(h.store.get(&TimerKey::placement(ROOM).to_key()).await.unwrap().is_some());
    assert!(h.store.get(&TimerKey::match_limit(ROOM).to_key()).await.unwrap().is_some());

    // First placement only answers the placer.
    h.notifier.clear();
    h.send(ROOM, "alice", &place_msg(&column_fleet(0))).await;
    assert_eq!(h.notifier.solo("alice", "GAME_STATE").len(), 1);
    assert!(h.notifier.solo("bob", "GAME_STATE").is_empty());
    assert!(h.notifier.room_updates().is_empty());

    h.notifier.clear();
    h.send(ROOM, "bob", &place_msg(&column_fleet(1))).await;
    assert_eq!(h.notifier.room_updates(), vec!["all ships placed, battle begins"]);
    let alice_view = &h.notifier.solo("alice", "GAME_STATE")[0];
    assert_eq!(alice_view["status"], "ACTIVE");
    assert_eq!(alice_view["activePlayer"], "alice");
    // Bob's ships are masked in Alice's view.
    assert_eq!(alice_view["opponentBoard"][1][0], 0);
    assert_eq!(alice_view["yourBoard"][0][0], 1);
    assert!(h.store.get(&TimerKey::placement(ROOM).to_key()).await.unwrap().is_none());
    assert!(h.store.get(&TimerKey::turn(ROOM).to_key()).await.unwrap().is_some());

    // A hit keeps the turn.
    h.notifier.clear();
    h.send(ROOM, "alice", &move_msg(1, 0)).await;
    let moves = h.notifier.room("MOVE");
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0]["result"], 2);
    assert_eq!(moves[0]["nextTurn"], "alice");
    assert_eq!(moves[0]["by"], "alice");
    assert!(moves[0]["endAt"].is_i64());

    // A miss passes it.
    h.notifier.clear();
    h.send(ROOM, "alice", &move_msg(4, 4)).await;
    assert_eq!(h.notifier.room("MOVE")[0]["result"], 3);
    assert_eq!(h.notifier.room("MOVE")[0]["nextTurn"], "bob");

    h.send(ROOM, "bob", &move_msg(3, 3)).await;
    for y in 1..5 {
        h.send(ROOM, "alice", &move_msg(1, y)).await;
    }

    let over = h.notifier.room("GAME_OVER");
    assert_eq!(over, vec![json!({ "winner": "alice" })]);

    let state = h.state(ROOM).await;
    assert_eq!(state.status, MatchStatus::Over);
    assert_eq!(state.winner.as_deref(), Some("alice"));
    assert_eq!(state.end_at, None);
    let bob_board = state.board("bob").unwrap();
    assert_eq!(bob_board.count(CellState::Ship), 0);
    assert_eq!(bob_board.count(CellState::Hit), 5);

    // Finished matches keep no timers.
    for timer in [TimerKey::turn(ROOM), TimerKey::match_limit(ROOM)] {
        assert!(h.store.get(&timer.to_key()).await.unwrap().is_none());
    }

    // Further shots are rejected as game over.
    h.send(ROOM, "bob", &move_msg(0, 0)).await;
    assert_eq!(h.notifier.error_codes("bob"), vec!["GAME_OVER"]);
}

#[tokio::test]
async fn shots_resolve_cells_exactly_once() {
    let h = harness();
    h.active_match(ROOM, "alice", "bob").await;

    h.send(ROOM, "alice", &move_msg(1, 2)).await;
    h.send(ROOM, "alice", &move_msg(1, 2)).await;
    assert_eq!(h.notifier.error_codes("alice"), vec!["ALREADY_TARGETED"]);

    let state = h.state(ROOM).await;
    assert_eq!(
        state.board("bob").unwrap().cell(Point::new(1, 2)),
        Some(CellState::Hit)
    );
    assert_eq!(h.notifier.room("MOVE").len(), 1);
}

#[tokio::test]
async fn chat_is_relayed_with_connection_identity() {
    let h = harness();
    h.connect(ROOM, "alice").await;

    h.send(ROOM, "alice", &chat_msg("glhf")).await;
    assert_eq!(
        h.notifier.room("CHAT"),
        vec![json!({ "sender": "alice", "message": "glhf" })]
    );

    // Chat works before a match even exists and takes no lock.
    assert!(h.repo.get(ROOM).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_message_types_are_ignored() {
    let h = harness();
    h.active_match(ROOM, "alice", "bob").await;
    h.notifier.clear();

    h.game
        .handle_message(ROOM, "alice", r#"{"type":"DANCE","payload":{}}"#)
        .await
        .unwrap();
    assert!(h.notifier.all().is_empty());
}
