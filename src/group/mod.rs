//! Party and match membership
//!
//! Both group kinds share one generic membership engine and differ only in
//! their join rules.

pub mod entity;
pub mod friends;
pub mod matches;
pub mod party;
pub mod service;

pub use entity::{GroupEntity, GroupSnapshot, Match, Party};
pub use friends::{FriendGraph, FriendshipOracle};
pub use matches::MatchMembershipService;
pub use party::{PartyMembershipService, PartyQueryService};
pub use service::{GroupMembershipService, JoinPolicy, MembershipState};
