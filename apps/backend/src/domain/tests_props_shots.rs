//! Property tests for shot resolution (pure domain, no store).
//!
//! Properties tested:
//! - activePlayer is always one of the two players
//! - cells only move along Empty->Ship->{Hit|Miss}; Hit and Miss are write-once
//! - Over always carries a winner who is a player
//! - out-of-bounds shots never mutate the match

use proptest::prelude::*;

use crate::domain::board::{CellState, Point};
use crate::domain::placement::place_ships;
use crate::domain::rules::BOARD_SIZE;
use crate::domain::shots::fire;
use crate::domain::state::{Match, MatchStatus};
use crate::domain::{test_gens, test_prelude};

fn started(fleet_a: &[Point], fleet_b: &[Point]) -> Match {
    let mut m = Match::new("P", "A", "B").expect("distinct players");
    place_ships(&mut m, "A", fleet_a).expect("A fleet is valid by construction");
    place_ships(&mut m, "B", fleet_b).expect("B fleet is valid by construction");
    m
}

fn legal_step(before: CellState, after: CellState) -> bool {
    before == after
        || matches!(
            (before, after),
            (CellState::Ship, CellState::Hit) | (CellState::Empty, CellState::Miss)
        )
}

proptest! {
    #![proptest_config(test_prelude::proptest_config())]

    #[test]
    fn prop_invariants_hold_over_any_shot_sequence(
        fleet_a in test_gens::fleet(),
        fleet_b in test_gens::fleet(),
        shots in test_gens::shot_sequence(),
    ) {
        let mut m = started(&fleet_a, &fleet_b);

        for (shooter_idx, target) in shots {
            let shooter = m.players[shooter_idx].clone();
            let before = m.clone();
            let res = fire(&mut m, &shooter, target);

            prop_assert!(m.is_player(&m.active_player));
            if m.status == MatchStatus::Over {
                prop_assert!(m.winner.as_deref().map(|w| m.is_player(w)).unwrap_or(false));
            }

            for owner in &m.players {
                let old = before.board(owner).unwrap();
                let new = m.board(owner).unwrap();
                for x in 0..BOARD_SIZE as i32 {
                    for y in 0..BOARD_SIZE as i32 {
                        let p = Point::new(x, y);
                        let (b, a) = (old.cell(p).unwrap(), new.cell(p).unwrap());
                        prop_assert!(legal_step(b, a), "illegal transition {:?} -> {:?}", b, a);
                    }
                }
            }

            match res {
                Ok(shot) => {
                    prop_assert!(matches!(shot.outcome, CellState::Hit | CellState::Miss));
                    if shot.outcome == CellState::Hit && shot.winner.is_none() {
                        prop_assert_eq!(&m.active_player, &shooter);
                    }
                }
                Err(_) => prop_assert_eq!(&m, &before),
            }
        }
    }

    #[test]
    fn prop_out_of_bounds_never_mutates(
        fleet_a in test_gens::fleet(),
        fleet_b in test_gens::fleet(),
        target in test_gens::any_point(),
    ) {
        let mut m = started(&fleet_a, &fleet_b);
        let in_bounds = m.board("B").unwrap().in_bounds(target);
        let before = m.clone();
        let res = fire(&mut m, "A", target);
        if !in_bounds {
            prop_assert!(res.is_err());
            prop_assert_eq!(m, before);
        }
    }
}
