//! Several hubs sharing one store, standing in for several processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use broadside::repos::MatchRepository;
use broadside::store::CoordinationStore;
use broadside::ws::hub::Hub;
use broadside::GameService;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::game_setup::{patient_timings, FINISHED_TTL, LOCK_TTL};

pub struct Node {
    pub hub: Hub,
    pub game: Arc<GameService>,
    pub repo: MatchRepository,
    pub shutdown: CancellationToken,
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub fn node(store: Arc<dyn CoordinationStore>, server_id: &str) -> Node {
    let repo = MatchRepository::new(store.clone(), LOCK_TTL);
    let (hub, hub_loop) = Hub::new(server_id, store);
    let game = Arc::new(GameService::new(
        repo.clone(),
        Arc::new(hub.clone()),
        patient_timings(),
        FINISHED_TTL,
    ));
    let shutdown = CancellationToken::new();
    hub_loop.spawn(game.clone(), shutdown.clone());
    Node {
        hub,
        game,
        repo,
        shutdown,
    }
}

impl Node {
    /// Wait until the hub has recorded `player`'s presence, which happens
    /// after its room subscription is live.
    pub async fn wait_registered(&self, player: &str) {
        let owner = self.hub.server_id().to_string();
        let start = tokio::time::Instant::now();
        loop {
            if self.repo.get_owning_process(player).await.unwrap().as_deref() == Some(owner.as_str()) {
                return;
            }
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "{player} never registered on {owner}"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Receive frames until one satisfies `pred`; returns it parsed.
pub async fn recv_matching<F>(rx: &mut mpsc::Receiver<String>, mut pred: F) -> Value
where
    F: FnMut(&Value) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout_at(deadline, rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed while waiting for frame");
        let value: Value = serde_json::from_str(&frame).unwrap_or(Value::String(frame));
        if pred(&value) {
            return value;
        }
    }
}

pub async fn recv_type(rx: &mut mpsc::Receiver<String>, kind: &str) -> Value {
    recv_matching(rx, |v| v["type"] == kind).await
}

/// First frame of each listed type, in whatever order they arrive.
pub async fn collect_types(
    rx: &mut mpsc::Receiver<String>,
    kinds: &[&str],
) -> HashMap<String, Value> {
    let mut seen = HashMap::new();
    while seen.len() < kinds.len() {
        let frame = recv_matching(rx, |v| {
            v["type"]
                .as_str()
                .is_some_and(|k| kinds.contains(&k) && !seen.contains_key(k))
        })
        .await;
        let kind = frame["type"].as_str().unwrap_or_default().to_string();
        seen.insert(kind, frame);
    }
    seen
}

/// Drain until the hub drops its side; panics if that does not happen.
pub async fn expect_closed(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut drained = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(frame)) => drained.push(frame),
            Ok(None) => return drained,
            Err(_) => panic!("connection was not closed; got {drained:?}"),
        }
    }
}
