//! Matchmaking queue: ordered stores, drain gate, subset search and
//! promotion of queued parties into matches

pub mod assigner;
pub mod matchmaking;
pub mod scheduler;
pub mod store;

pub use assigner::{Candidate, SubsetAssigner};
pub use matchmaking::{DrainOutcome, MatchmakingQueue, QueueOptions};
pub use scheduler::{DrainGate, DrainPermit, GateScope};
pub use store::{InMemoryOrderedStore, OrderedStore, QueueStores};
