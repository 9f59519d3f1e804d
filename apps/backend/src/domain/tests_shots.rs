use crate::domain::board::{CellState, Point};
use crate::domain::shots::fire;
use crate::domain::state::MatchStatus;
use crate::domain::test_state_helpers::{active_match, waiting_match};
use crate::errors::domain::ValidationKind;

// In `active_match`, B's ships sit on the diagonal and A's on row 0.

#[test]
fn hit_keeps_the_turn() {
    let mut m = active_match();
    let res = fire(&mut m, "A", Point::new(2, 2)).unwrap();
    assert_eq!(res.outcome, CellState::Hit);
    assert_eq!(res.next_turn, "A");
    assert_eq!(m.active_player, "A");
    assert_eq!(m.board("B").unwrap().cell(Point::new(2, 2)), Some(CellState::Hit));
}

#[test]
fn miss_passes_the_turn() {
    let mut m = active_match();
    let res = fire(&mut m, "A", Point::new(0, 1)).unwrap();
    assert_eq!(res.outcome, CellState::Miss);
    assert_eq!(res.next_turn, "B");
    assert_eq!(m.active_player, "B");
}

#[test]
fn out_of_bounds_never_mutates() {
    let mut m = active_match();
    let before = m.clone();
    let err = fire(&mut m, "A", Point::new(6, 0)).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::OutOfBounds);
    assert_eq!(m, before);
}

#[test]
fn non_active_player_is_rejected() {
    let mut m = active_match();
    let before = m.clone();
    let err = fire(&mut m, "B", Point::new(0, 0)).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::NotYourTurn);
    assert_eq!(m, before);
}

#[test]
fn resolved_cells_cannot_be_retargeted() {
    let mut m = active_match();
    fire(&mut m, "A", Point::new(1, 1)).unwrap();
    let err = fire(&mut m, "A", Point::new(1, 1)).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::AlreadyTargeted);

    fire(&mut m, "A", Point::new(3, 0)).unwrap();
    // B's turn now; A's (3,0) is empty water for B to miss.
    fire(&mut m, "B", Point::new(3, 0)).unwrap();
    let err = fire(&mut m, "A", Point::new(3, 0)).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::AlreadyTargeted);
}

#[test]
fn shots_before_placement_are_rejected() {
    let mut m = waiting_match();
    let err = fire(&mut m, "A", Point::new(0, 0)).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::NotActive);
}

#[test]
fn sinking_last_ship_ends_the_match() {
    let mut m = active_match();
    for i in 0..4 {
        let res = fire(&mut m, "A", Point::new(i, i)).unwrap();
        assert_eq!(res.outcome, CellState::Hit);
        assert_eq!(res.winner, None);
        assert_eq!(m.status, MatchStatus::Active);
    }

    let last = fire(&mut m, "A", Point::new(4, 4)).unwrap();
    assert_eq!(last.outcome, CellState::Hit);
    assert_eq!(last.winner.as_deref(), Some("A"));
    assert_eq!(m.status, MatchStatus::Over);
    assert_eq!(m.winner.as_deref(), Some("A"));

    for who in ["A", "B"] {
        let err = fire(&mut m, who, Point::new(3, 1)).unwrap_err();
        assert_eq!(err.kind(), ValidationKind::GameOver);
    }
}
