//! Test logging shared by unit tests (via a `ctor` hook in the library) and
//! by each integration test binary.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Quiet unless asked: hub and timer logs are noisy under concurrent tests.
const DEFAULT_FILTER: &str = "warn,redis=error";

/// Install a test-writer subscriber once per process.
///
/// The filter comes from `TEST_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_FILTER`]. Safe to call from any number of tests; if another
/// subscriber is already installed this is a no-op.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .compact()
            .try_init()
            .ok();
    });
}
