#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod config;
pub mod domain;
pub mod error;
pub mod errors;
pub mod infra;
pub mod middleware;
pub mod repos;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
pub mod ws;

// Re-exports for public API
pub use config::Config;
pub use error::AppError;
pub use infra::state::build_state;
pub use services::GameService;
pub use state::app_state::AppState;
pub use store::{CoordinationStore, MemoryStore, RedisStore};

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}
