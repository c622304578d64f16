//! Party membership
//!
//! Only a party leader can merge into another party, and they bring their
//! whole party with them.

use crate::error::Result;
use crate::group::entity::{GroupSnapshot, Party};
use crate::group::friends::FriendshipOracle;
use crate::group::service::{GroupMembershipService, JoinPolicy, MembershipState};
use crate::metrics::MetricsCollector;
use crate::types::{ParticipantId, Privacy};
use std::sync::Arc;
use tracing::error;

/// What other components need to know about parties
pub trait PartyQueryService: Send + Sync {
    /// Everyone in `member`'s party, empty if they have none
    fn get_players(&self, member: ParticipantId) -> Vec<ParticipantId>;

    fn is_leader(&self, participant: ParticipantId) -> bool;

    fn leave(&self, participant: ParticipantId) -> bool;
}

/// A joining leader brings every member of their own party
struct PartyJoinPolicy;

impl JoinPolicy<Party> for PartyJoinPolicy {
    fn travellers(
        &self,
        state: &MembershipState<Party>,
        joiner: ParticipantId,
    ) -> Option<Vec<ParticipantId>> {
        if !state.is_leader(joiner) {
            return None;
        }
        Some(state.players(joiner))
    }
}

/// Membership service for parties
pub struct PartyMembershipService {
    inner: GroupMembershipService<Party>,
}

impl PartyMembershipService {
    pub fn new(friendships: Arc<dyn FriendshipOracle>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            inner: GroupMembershipService::new(Arc::new(PartyJoinPolicy), friendships, metrics),
        }
    }

    pub fn create(&self, leader: ParticipantId) -> Result<bool> {
        self.inner.create(leader)
    }

    pub fn get_group(&self, participant: ParticipantId) -> Result<Option<GroupSnapshot>> {
        self.inner.get_group(participant)
    }

    pub fn request_join(
        &self,
        joiner: ParticipantId,
        leader: ParticipantId,
        password: Option<&str>,
    ) -> Result<bool> {
        self.inner.request_join(joiner, leader, password)
    }

    /// Merge `joiner`'s whole party into `leader`'s party
    pub fn join(&self, joiner: ParticipantId, leader: ParticipantId) -> Result<bool> {
        self.inner.join(joiner, leader)
    }

    pub fn leave(&self, participant: ParticipantId) -> Result<bool> {
        self.inner.leave(participant)
    }

    pub fn kick_player(&self, caller: ParticipantId, target: ParticipantId) -> Result<bool> {
        self.inner.kick_player(caller, target)
    }

    pub fn set_privacy(
        &self,
        caller: ParticipantId,
        privacy: Privacy,
        password: Option<String>,
    ) -> Result<bool> {
        self.inner.set_privacy(caller, privacy, password)
    }

    pub fn set_password(&self, caller: ParticipantId, password: String) -> Result<bool> {
        self.inner.set_password(caller, password)
    }

    pub fn invite_player(&self, caller: ParticipantId, invitee: ParticipantId) -> Result<bool> {
        self.inner.invite_player(caller, invitee)
    }

    pub fn players(&self, member: ParticipantId) -> Result<Vec<ParticipantId>> {
        self.inner.get_players(member)
    }

    pub fn leads_party(&self, participant: ParticipantId) -> Result<bool> {
        self.inner.is_leader(participant)
    }

    pub fn party_count(&self) -> Result<usize> {
        self.inner.group_count()
    }

    #[cfg(test)]
    pub(crate) fn violation(&self) -> Option<String> {
        self.inner.violation()
    }
}

// The collaborator view swallows internal errors into "no party"; they are
// logged so a poisoned lock is still visible.
impl PartyQueryService for PartyMembershipService {
    fn get_players(&self, member: ParticipantId) -> Vec<ParticipantId> {
        self.players(member).unwrap_or_else(|e| {
            error!("Party lookup for {} failed: {}", member, e);
            Vec::new()
        })
    }

    fn is_leader(&self, participant: ParticipantId) -> bool {
        self.leads_party(participant).unwrap_or_else(|e| {
            error!("Party leader check for {} failed: {}", participant, e);
            false
        })
    }

    fn leave(&self, participant: ParticipantId) -> bool {
        PartyMembershipService::leave(self, participant).unwrap_or_else(|e| {
            error!("Party leave for {} failed: {}", participant, e);
            false
        })
    }
}
