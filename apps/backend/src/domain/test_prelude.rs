//! Proptest settings for the shot and placement properties.
//!
//! `PROPTEST_CASES` overrides the case count (default 128; a 5x5 board
//! keeps each case cheap).

use proptest::prelude::ProptestConfig;

const DEFAULT_CASES: u32 = 128;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_CASES);

    ProptestConfig {
        cases,
        // No regression files in the source tree.
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}
