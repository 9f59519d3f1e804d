//! Game service wired to an in-memory store and a recording notifier.

use std::sync::Arc;
use std::time::Duration;

use broadside::domain::{Match, MatchStatus, Point, Timings};
use broadside::repos::MatchRepository;
use broadside::store::CoordinationStore;
use broadside::{GameService, MemoryStore};
use serde_json::json;

use super::recording_notifier::RecordingNotifier;

pub const SERVER_ID: &str = "node-test";
pub const LOCK_TTL: Duration = Duration::from_secs(5);
pub const FINISHED_TTL: Duration = Duration::from_secs(600);

/// Timings long enough that no timer fires during a test.
pub fn patient_timings() -> Timings {
    Timings {
        turn: Duration::from_secs(60),
        placement: Duration::from_secs(60),
        disconnect_grace: Duration::from_secs(60),
        match_limit: Duration::from_secs(600),
    }
}

/// Timings whose deadlines are already due when a handler checks them.
pub fn hasty_timings() -> Timings {
    Timings {
        turn: Duration::from_secs(1),
        placement: Duration::from_secs(1),
        disconnect_grace: Duration::from_secs(1),
        match_limit: Duration::from_secs(2),
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub repo: MatchRepository,
    pub game: Arc<GameService>,
    pub notifier: RecordingNotifier,
}

pub fn harness() -> Harness {
    harness_with(MemoryStore::new(), patient_timings())
}

pub fn harness_with(store: MemoryStore, timings: Timings) -> Harness {
    let store = Arc::new(store);
    let dyn_store: Arc<dyn CoordinationStore> = store.clone();
    let repo = MatchRepository::new(dyn_store, LOCK_TTL);
    let notifier = RecordingNotifier::new();
    let game = Arc::new(GameService::new(
        repo.clone(),
        Arc::new(notifier.clone()),
        timings,
        FINISHED_TTL,
    ));
    Harness {
        store,
        repo,
        game,
        notifier,
    }
}

/// Five single-cell ships down column `x`.
pub fn column_fleet(x: i32) -> Vec<Point> {
    (0..5).map(|y| Point::new(x, y)).collect()
}

pub fn place_msg(ships: &[Point]) -> String {
    json!({ "type": "PLACE_SHIP", "payload": { "ships": ships } }).to_string()
}

pub fn move_msg(x: i32, y: i32) -> String {
    json!({ "type": "MOVE", "payload": { "x": x, "y": y } }).to_string()
}

pub fn chat_msg(message: &str) -> String {
    json!({ "type": "CHAT", "payload": { "message": message } }).to_string()
}

impl Harness {
    /// What the hub does on register: record presence, then join.
    pub async fn connect(&self, room: &str, player: &str) {
        self.repo.set_presence(player, SERVER_ID).await.unwrap();
        self.game.handle_join(room, player).await.unwrap();
    }

    /// What the hub does on unregister.
    pub async fn disconnect(&self, room: &str, player: &str) {
        assert!(self.repo.remove_presence(player, SERVER_ID).await.unwrap());
        self.game.handle_leave(room, player).await.unwrap();
    }

    pub async fn state(&self, room: &str) -> Match {
        self.repo.get(room).await.unwrap().expect("match exists")
    }

    pub async fn send(&self, room: &str, player: &str, text: &str) {
        let _ = self.game.handle_message(room, player, text).await;
    }

    /// Both players joined and placed: `first` ships in column 0, `second`
    /// in column 1. `first` has the first turn.
    pub async fn active_match(&self, room: &str, first: &str, second: &str) -> Match {
        self.connect(room, first).await;
        self.connect(room, second).await;
        self.game
            .handle_message(room, first, &place_msg(&column_fleet(0)))
            .await
            .unwrap();
        self.game
            .handle_message(room, second, &place_msg(&column_fleet(1)))
            .await
            .unwrap();
        let state = self.state(room).await;
        assert_eq!(state.status, MatchStatus::Active);
        assert_eq!(state.active_player, first);
        state
    }
}
