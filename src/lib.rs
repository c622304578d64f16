//! Party Queue - party and match membership with an exact-size matchmaking queue
//!
//! Participants gather into parties and matches under privacy rules. Party
//! leaders queue for a match of a fixed size and the queue merges queued
//! parties into started matches of exactly that size.

pub mod config;
pub mod error;
pub mod events;
pub mod group;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use config::AppConfig;
pub use events::GroupEventPublisher;
pub use group::{MatchMembershipService, PartyMembershipService};
pub use queue::{MatchmakingQueue, OrderedStore};
pub use service::{AppState, GroupApi};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
