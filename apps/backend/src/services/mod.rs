//! Orchestration services above the domain and repository layers.

pub mod game;
pub mod notifier;
pub mod timeouts;

pub use game::GameService;
pub use notifier::Notifier;
pub use timeouts::TimeoutListener;
