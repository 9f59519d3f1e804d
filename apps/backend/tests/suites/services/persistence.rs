//! A save that fails leaves no trace: one ERROR to the sender, nothing
//! broadcast, nothing armed, the stored match untouched.

use broadside::errors::ErrorCode;
use broadside::store::keys::TimerKey;
use broadside::store::CoordinationStore;

use crate::support::game_setup::{column_fleet, harness, move_msg, place_msg};

const ROOM: &str = "5a5a5a5a5a";

#[tokio::test]
async fn failed_save_of_a_shot_reports_to_the_shooter_only() {
    let h = harness();
    let before = h.active_match(ROOM, "alice", "bob").await;
    h.notifier.clear();

    h.store.fail_writes_to("game:");
    let err = h
        .game
        .handle_message(ROOM, "alice", &move_msg(1, 0))
        .await
        .unwrap_err();
    h.store.heal_writes();

    assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    assert_eq!(h.notifier.error_codes("alice"), vec!["STORE_UNAVAILABLE"]);
    assert_eq!(h.notifier.all().len(), 1, "{:?}", h.notifier.all());
    assert_eq!(h.state(ROOM).await, before);

    // The turn clock cleared for the shot is running again.
    let turn = TimerKey::turn(ROOM).to_key();
    assert!(h.store.get(&turn).await.unwrap().is_some());

    // Once the store recovers the same shot goes through.
    h.send(ROOM, "alice", &move_msg(1, 0)).await;
    assert_eq!(h.notifier.room("MOVE").len(), 1);
    assert_eq!(h.state(ROOM).await.hits_by("alice"), 1);
}

#[tokio::test]
async fn failed_save_of_a_placement_changes_nothing() {
    let h = harness();
    h.connect(ROOM, "alice").await;
    h.connect(ROOM, "bob").await;
    h.game
        .handle_message(ROOM, "bob", &place_msg(&column_fleet(1)))
        .await
        .unwrap();
    let before = h.state(ROOM).await;
    h.notifier.clear();

    h.store.fail_writes_to("game:");
    let err = h
        .game
        .handle_message(ROOM, "alice", &place_msg(&column_fleet(0)))
        .await
        .unwrap_err();
    h.store.heal_writes();

    assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    assert_eq!(h.notifier.error_codes("alice"), vec!["STORE_UNAVAILABLE"]);
    assert!(h.notifier.error_codes("bob").is_empty());
    assert!(h.notifier.room_updates().is_empty());
    assert!(h.notifier.solo("alice", "GAME_STATE").is_empty());
    assert_eq!(h.state(ROOM).await, before);

    // Placement phase is still open: no turn timer, placement timer intact.
    assert!(h.store.get(&TimerKey::turn(ROOM).to_key()).await.unwrap().is_none());
    assert!(h
        .store
        .get(&TimerKey::placement(ROOM).to_key())
        .await
        .unwrap()
        .is_some());
}
