//! Friendship lookups used by `FriendsOnly` groups

use crate::types::ParticipantId;
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::warn;

/// External friendship oracle
pub trait FriendshipOracle: Send + Sync {
    /// Whether `a` counts as a friend of `b`
    fn is_friend_of(&self, a: ParticipantId, b: ParticipantId) -> bool;
}

/// In-memory, symmetric friendship graph
#[derive(Debug, Default)]
pub struct FriendGraph {
    edges: RwLock<HashSet<(ParticipantId, ParticipantId)>>,
}

impl FriendGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn edge(a: ParticipantId, b: ParticipantId) -> (ParticipantId, ParticipantId) {
        (a.min(b), a.max(b))
    }

    pub fn add_friendship(&self, a: ParticipantId, b: ParticipantId) {
        match self.edges.write() {
            Ok(mut edges) => {
                edges.insert(Self::edge(a, b));
            }
            Err(_) => warn!("Friend graph lock poisoned, dropping friendship {} <-> {}", a, b),
        }
    }

    pub fn remove_friendship(&self, a: ParticipantId, b: ParticipantId) {
        if let Ok(mut edges) = self.edges.write() {
            edges.remove(&Self::edge(a, b));
        }
    }
}

impl FriendshipOracle for FriendGraph {
    fn is_friend_of(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.edges
            .read()
            .map(|edges| edges.contains(&Self::edge(a, b)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_friendship_is_symmetric() {
        let graph = FriendGraph::new();
        graph.add_friendship(1, 2);

        assert!(graph.is_friend_of(1, 2));
        assert!(graph.is_friend_of(2, 1));
        assert!(!graph.is_friend_of(1, 3));

        graph.remove_friendship(2, 1);
        assert!(!graph.is_friend_of(1, 2));
    }
}
