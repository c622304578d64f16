//! Operations exposed to the transport layer
//!
//! Every mutator answers with a plain success flag. Unexpected failures
//! (poisoned state, ordered store errors) are logged here and reported as
//! `false`; expected rejections are already `false` underneath.

use crate::error::Result;
use crate::group::entity::GroupSnapshot;
use crate::group::matches::MatchMembershipService;
use crate::group::party::PartyMembershipService;
use crate::queue::matchmaking::MatchmakingQueue;
use crate::types::{GroupKind, MatchSettings, ParticipantId, Privacy, QueueSize};
use std::sync::Arc;
use tracing::{error, warn};

fn settle(operation: &str, result: Result<bool>) -> bool {
    result.unwrap_or_else(|e| {
        error!("{} failed: {}", operation, e);
        false
    })
}

/// Public surface over the party, match and queue services
#[derive(Clone)]
pub struct GroupApi {
    parties: Arc<PartyMembershipService>,
    matches: Arc<MatchMembershipService>,
    queue: Arc<MatchmakingQueue>,
}

impl GroupApi {
    pub fn new(
        parties: Arc<PartyMembershipService>,
        matches: Arc<MatchMembershipService>,
        queue: Arc<MatchmakingQueue>,
    ) -> Self {
        Self {
            parties,
            matches,
            queue,
        }
    }

    /// A newly arrived participant starts in a party of their own
    pub fn connect(&self, participant: ParticipantId) -> bool {
        settle("connect", self.parties.create(participant))
    }

    /// Remove a departing participant from the queue, their match and
    /// their party. True if any of those held them.
    pub async fn disconnect(&self, participant: ParticipantId) -> bool {
        let dequeued = match self.queue.dequeue(participant).await {
            Ok(dequeued) => dequeued,
            Err(e) => {
                warn!("Dequeue of disconnecting {} failed: {}", participant, e);
                false
            }
        };
        let left_match = settle("disconnect match leave", self.matches.leave(participant));
        let left_party = settle("disconnect party leave", self.parties.leave(participant));
        dequeued || left_match || left_party
    }

    pub fn create_group(&self, kind: GroupKind, leader: ParticipantId) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.create(leader),
            GroupKind::Match => self.matches.create(leader),
        };
        settle("create group", result)
    }

    pub fn get_group(&self, kind: GroupKind, participant: ParticipantId) -> Option<GroupSnapshot> {
        let result = match kind {
            GroupKind::Party => self.parties.get_group(participant),
            GroupKind::Match => self.matches.get_group(participant),
        };
        result.unwrap_or_else(|e| {
            error!("get group failed: {}", e);
            None
        })
    }

    pub fn is_leader(&self, kind: GroupKind, participant: ParticipantId) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.leads_party(participant),
            GroupKind::Match => self.matches.is_leader(participant),
        };
        settle("leader check", result)
    }

    pub fn request_join_group(
        &self,
        kind: GroupKind,
        joiner: ParticipantId,
        leader: ParticipantId,
        password: Option<&str>,
    ) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.request_join(joiner, leader, password),
            GroupKind::Match => self.matches.request_join(joiner, leader, password),
        };
        settle("join group", result)
    }

    pub fn leave_group(&self, kind: GroupKind, participant: ParticipantId) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.leave(participant),
            GroupKind::Match => self.matches.leave(participant),
        };
        settle("leave group", result)
    }

    pub fn kick_from_group(
        &self,
        kind: GroupKind,
        caller: ParticipantId,
        target: ParticipantId,
    ) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.kick_player(caller, target),
            GroupKind::Match => self.matches.kick_player(caller, target),
        };
        settle("kick", result)
    }

    pub fn set_group_privacy(
        &self,
        kind: GroupKind,
        caller: ParticipantId,
        privacy: Privacy,
        password: Option<String>,
    ) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.set_privacy(caller, privacy, password),
            GroupKind::Match => self.matches.set_privacy(caller, privacy, password),
        };
        settle("set privacy", result)
    }

    pub fn set_group_password(&self, kind: GroupKind, caller: ParticipantId, password: String) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.set_password(caller, password),
            GroupKind::Match => self.matches.set_password(caller, password),
        };
        settle("set password", result)
    }

    pub fn set_group_settings(&self, caller: ParticipantId, settings: MatchSettings) -> bool {
        settle("set settings", self.matches.set_settings(caller, settings))
    }

    pub fn invite_to_group(
        &self,
        kind: GroupKind,
        caller: ParticipantId,
        invitee: ParticipantId,
    ) -> bool {
        let result = match kind {
            GroupKind::Party => self.parties.invite_player(caller, invitee),
            GroupKind::Match => self.matches.invite_player(caller, invitee),
        };
        settle("invite", result)
    }

    pub fn start_match(&self, caller: ParticipantId) -> bool {
        settle("start match", self.matches.start_match(caller))
    }

    /// Queue the caller's party for a match of `size` participants
    pub async fn enqueue_for_match(&self, participant: ParticipantId, size: usize) -> bool {
        let size = match QueueSize::try_from(size) {
            Ok(size) => size,
            Err(e) => {
                warn!("Enqueue of {} rejected: {}", participant, e);
                return false;
            }
        };
        settle("enqueue", self.queue.enqueue(participant, size).await)
    }

    pub async fn dequeue_from_match(&self, participant: ParticipantId) -> bool {
        settle("dequeue", self.queue.dequeue(participant).await)
    }

    pub async fn queued_size(&self, participant: ParticipantId) -> Option<QueueSize> {
        self.queue.queued_size(participant).await
    }
}
