use crate::domain::board::{CellState, Point};
use crate::domain::placement::place_ships;
use crate::domain::state::MatchStatus;
use crate::domain::test_state_helpers::{active_match, diagonal_fleet, row_fleet, waiting_match};
use crate::errors::domain::ValidationKind;

#[test]
fn row_placement_succeeds_exactly_once() {
    let mut m = waiting_match();

    let res = place_ships(&mut m, "A", &row_fleet()).unwrap();
    assert!(!res.match_started);
    assert_eq!(m.board("A").unwrap().count(CellState::Ship), 5);
    for y in 0..5 {
        assert_eq!(m.board("A").unwrap().cell(Point::new(0, y)), Some(CellState::Ship));
    }

    let before = m.clone();
    let err = place_ships(&mut m, "A", &diagonal_fleet()).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::ShipsAlreadyPlaced);
    assert_eq!(err.to_string(), "ship already placed");
    assert_eq!(m, before, "rejected placement must not touch the match");
}

#[test]
fn second_placement_starts_match_with_first_player() {
    let mut m = waiting_match();
    place_ships(&mut m, "B", &diagonal_fleet()).unwrap();
    assert_eq!(m.status, MatchStatus::WaitingForShips);

    let res = place_ships(&mut m, "A", &row_fleet()).unwrap();
    assert!(res.match_started);
    assert_eq!(m.status, MatchStatus::Active);
    assert_eq!(m.active_player, "A");
}

#[test]
fn wrong_ship_count_is_rejected() {
    let mut m = waiting_match();
    let short: Vec<Point> = row_fleet().into_iter().take(3).collect();
    let err = place_ships(&mut m, "A", &short).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::WrongShipCount);
    assert_eq!(err.to_string(), "expected 5 ships, got 3");
    assert!(!m.has_placed("A"));
}

#[test]
fn out_of_bounds_ship_is_rejected_without_partial_writes() {
    let mut m = waiting_match();
    let mut fleet = row_fleet();
    fleet[4] = Point::new(5, 0);
    let err = place_ships(&mut m, "A", &fleet).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::OutOfBounds);
    assert_eq!(m.board("A").unwrap().count(CellState::Ship), 0);
}

#[test]
fn overlapping_ships_are_rejected() {
    let mut m = waiting_match();
    let mut fleet = row_fleet();
    fleet[4] = Point::new(0, 0);
    let err = place_ships(&mut m, "A", &fleet).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::OverlappingShips);
    assert_eq!(m.board("A").unwrap().count(CellState::Ship), 0);
}

#[test]
fn placement_outside_window_is_rejected() {
    let mut m = active_match();
    let err = place_ships(&mut m, "A", &row_fleet()).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::PlacementClosed);
}

#[test]
fn stranger_cannot_place() {
    let mut m = waiting_match();
    let err = place_ships(&mut m, "C", &row_fleet()).unwrap_err();
    assert_eq!(err.kind(), ValidationKind::UnknownPlayer);
}
