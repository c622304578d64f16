//! Match membership
//!
//! Parties decide who travels together: creating a match pulls in the
//! creator's party and joining pulls in the joiner's party. Starting a match
//! takes every member out of their party and seals the match. A sealed match
//! stays readable until one of its members enters a new match, which
//! supersedes it.

use crate::error::Result;
use crate::group::entity::{GroupEntity, GroupSnapshot, Match};
use crate::group::friends::FriendshipOracle;
use crate::group::party::PartyQueryService;
use crate::group::service::{GroupMembershipService, JoinPolicy, MembershipState};
use crate::metrics::MetricsCollector;
use crate::types::{MatchSettings, ParticipantId, Privacy};
use std::sync::Arc;
use tracing::{debug, info};

struct MatchJoinPolicy {
    parties: Arc<dyn PartyQueryService>,
}

impl JoinPolicy<Match> for MatchJoinPolicy {
    fn travellers(
        &self,
        _state: &MembershipState<Match>,
        joiner: ParticipantId,
    ) -> Option<Vec<ParticipantId>> {
        if !self.parties.is_leader(joiner) {
            return None;
        }
        Some(self.parties.get_players(joiner))
    }

    fn founders(&self, _state: &MembershipState<Match>, leader: ParticipantId) -> Vec<ParticipantId> {
        if self.parties.is_leader(leader) {
            self.parties.get_players(leader)
        } else {
            Vec::new()
        }
    }
}

/// Membership service for matches
pub struct MatchMembershipService {
    inner: GroupMembershipService<Match>,
    parties: Arc<dyn PartyQueryService>,
}

impl MatchMembershipService {
    pub fn new(
        parties: Arc<dyn PartyQueryService>,
        friendships: Arc<dyn FriendshipOracle>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let policy = Arc::new(MatchJoinPolicy {
            parties: parties.clone(),
        });
        Self {
            inner: GroupMembershipService::new(policy, friendships, metrics),
            parties,
        }
    }

    /// Create a match led by `leader`, copying in the leader's party
    pub fn create(&self, leader: ParticipantId) -> Result<bool> {
        if self.in_open_match(leader)? {
            debug!("Match create by {} rejected: already in an open match", leader);
            return Ok(false);
        }

        // Founders are moved out of their old matches by the join path
        self.release_started(leader)?;
        self.inner.create(leader)
    }

    pub fn get_group(&self, participant: ParticipantId) -> Result<Option<GroupSnapshot>> {
        self.inner.get_group(participant)
    }

    pub fn is_leader(&self, participant: ParticipantId) -> Result<bool> {
        self.inner.is_leader(participant)
    }

    pub fn request_join(
        &self,
        joiner: ParticipantId,
        leader: ParticipantId,
        password: Option<&str>,
    ) -> Result<bool> {
        self.inner.request_join(joiner, leader, password)
    }

    /// Pull `joiner`'s whole party into `leader`'s match
    pub fn join(&self, joiner: ParticipantId, leader: ParticipantId) -> Result<bool> {
        self.inner.join(joiner, leader)
    }

    fn in_open_match(&self, participant: ParticipantId) -> Result<bool> {
        Ok(self
            .get_group(participant)?
            .is_some_and(|game| game.started != Some(true)))
    }

    /// Take `participant` out of a started match they still sit in
    fn release_started(&self, participant: ParticipantId) -> Result<()> {
        if self.inner.release_if(participant, |game| game.is_started())? {
            debug!("{} released from their started match", participant);
        }
        Ok(())
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

    pub fn set_settings(&self, caller: ParticipantId, settings: MatchSettings) -> Result<bool> {
        self.inner
            .modify_as_leader(caller, |game| game.set_settings(settings))
    }

    /// Seal the caller's match and take every member out of their party.
    ///
    /// There is no rollback: a failed party leave is logged and skipped.
    pub fn start_match(&self, caller: ParticipantId) -> Result<bool> {
        let sealed = self.inner.with_leader_group(caller, |game| {
            if game.is_started() {
                return None;
            }
            game.mark_started();
            Some(game.members().iter().copied().collect::<Vec<_>>())
        })?;

        let Some(members) = sealed.flatten() else {
            debug!("Match start by {} rejected", caller);
            return Ok(false);
        };

        for member in &members {
            if !self.parties.leave(*member) {
                debug!("{} had no party to leave on match start", member);
            }
        }

        self.inner.metrics().record_match_started();
        info!(
            "Match led by {} started with {} member(s)",
            caller,
            members.len()
        );
        Ok(true)
    }

    pub fn is_started(&self, participant: ParticipantId) -> Result<bool> {
        Ok(self
            .get_group(participant)?
            .and_then(|game| game.started)
            .unwrap_or(false))
    }

    pub fn match_count(&self) -> Result<usize> {
        self.inner.group_count()
    }

    #[cfg(test)]
    pub(crate) fn violation(&self) -> Option<String> {
        self.inner.violation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::friends::FriendGraph;
    use crate::group::party::PartyMembershipService;
    use proptest::prelude::*;

    fn create_test_services() -> (Arc<PartyMembershipService>, MatchMembershipService) {
        let friends = Arc::new(FriendGraph::new());
        let metrics = Arc::new(MetricsCollector::default());
        let parties = Arc::new(PartyMembershipService::new(friends.clone(), metrics.clone()));
        let matches = MatchMembershipService::new(parties.clone(), friends, metrics);
        (parties, matches)
    }

    fn party_of(parties: &PartyMembershipService, leader: ParticipantId, members: &[ParticipantId]) {
        parties.create(leader).unwrap();
        for member in members {
            parties.create(*member).unwrap();
            assert!(parties.request_join(*member, leader, None).unwrap());
        }
    }

    #[test]
    fn test_create_copies_party() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[2, 3]);

        assert!(matches.create(1).unwrap());
        let game = matches.get_group(3).unwrap().unwrap();
        assert_eq!(game.leader, 1);
        assert_eq!(game.members, vec![1, 2, 3]);
        assert_eq!(game.started, Some(false));
    }

    #[test]
    fn test_join_pulls_in_party() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[]);
        party_of(&parties, 5, &[6]);
        matches.create(1).unwrap();

        assert!(matches.request_join(5, 1, None).unwrap());
        assert_eq!(matches.get_group(1).unwrap().unwrap().members, vec![1, 5, 6]);

        // Party followers cannot join on their own
        party_of(&parties, 8, &[9]);
        assert!(!matches.request_join(9, 1, None).unwrap());
    }

    #[test]
    fn test_start_match_leaves_parties() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[2]);
        party_of(&parties, 3, &[]);
        matches.create(1).unwrap();
        matches.join(3, 1).unwrap();

        // Only the leader can start
        assert!(!matches.start_match(2).unwrap());
        assert!(matches.start_match(1).unwrap());

        for p in [1, 2, 3] {
            assert!(parties.get_group(p).unwrap().is_none());
            assert!(matches.is_started(p).unwrap());
        }
    }

    #[test]
    fn test_started_match_is_sealed() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[]);
        party_of(&parties, 4, &[]);
        matches.create(1).unwrap();
        matches.start_match(1).unwrap();

        assert!(!matches.request_join(4, 1, None).unwrap());
        assert_eq!(matches.get_group(1).unwrap().unwrap().members, vec![1]);
    }

    #[test]
    fn test_new_match_supersedes_started_one() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[]);
        party_of(&parties, 2, &[]);
        matches.create(2).unwrap();
        matches.join(1, 2).unwrap();
        assert!(matches.start_match(2).unwrap());

        // Back in parties after the game, then matched again the other way round
        party_of(&parties, 1, &[]);
        party_of(&parties, 2, &[]);
        assert!(matches.create(1).unwrap());
        assert!(matches.join(2, 1).unwrap());

        let game = matches.get_group(2).unwrap().unwrap();
        assert_eq!(game.leader, 1);
        assert_eq!(game.members, vec![1, 2]);
        assert_eq!(game.started, Some(false));
        assert_eq!(matches.match_count().unwrap(), 1);
    }

    #[test]
    fn test_open_match_is_not_superseded() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[]);
        party_of(&parties, 3, &[]);
        matches.create(1).unwrap();

        assert!(!matches.create(1).unwrap());
        assert!(matches.create(3).unwrap());
        // A self-join does not free 3 from their started match
        assert!(matches.start_match(3).unwrap());
        party_of(&parties, 3, &[]);
        assert!(!matches.join(3, 3).unwrap());
        assert!(matches.is_started(3).unwrap());
        assert_eq!(matches.match_count().unwrap(), 2);
    }

    #[test]
    fn test_settings_are_leader_only() {
        let (parties, matches) = create_test_services();
        party_of(&parties, 1, &[2]);
        matches.create(1).unwrap();

        let settings = MatchSettings(serde_json::json!({ "map": "harbour", "rounds": 3 }));
        assert!(!matches.set_settings(2, settings.clone()).unwrap());
        assert!(matches.set_settings(1, settings.clone()).unwrap());
        assert_eq!(
            matches.get_group(2).unwrap().unwrap().settings,
            Some(settings)
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Connect(u64),
        PartyJoin(u64, u64),
        PartyLeave(u64),
        Create(u64),
        Join(u64, u64),
        Leave(u64),
        Kick(u64, u64),
        Start(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        let id = 0u64..8;
        prop_oneof![
            id.clone().prop_map(Op::Connect),
            (id.clone(), id.clone()).prop_map(|(a, b)| Op::PartyJoin(a, b)),
            id.clone().prop_map(Op::PartyLeave),
            id.clone().prop_map(Op::Create),
            (id.clone(), id.clone()).prop_map(|(a, b)| Op::Join(a, b)),
            id.clone().prop_map(Op::Leave),
            (id.clone(), id.clone()).prop_map(|(a, b)| Op::Kick(a, b)),
            id.prop_map(Op::Start),
        ]
    }

    proptest! {
        #[test]
        fn prop_match_membership_follows_parties(
            ops in proptest::collection::vec(op_strategy(), 1..100)
        ) {
            let (parties, matches) = create_test_services();

            for op in ops {
                match op {
                    Op::Connect(p) => { parties.create(p).unwrap(); }
                    Op::PartyJoin(j, l) => { parties.request_join(j, l, None).unwrap(); }
                    Op::PartyLeave(p) => { parties.leave(p).unwrap(); }
                    Op::Create(p) => {
                        let party = parties.players(p).unwrap();
                        let leads = parties.leads_party(p).unwrap();
                        if matches.create(p).unwrap() && leads {
                            prop_assert_eq!(matches.get_group(p).unwrap().unwrap().members, party);
                        }
                    }
                    Op::Join(j, l) => {
                        let party = parties.players(j).unwrap();
                        if matches.request_join(j, l, None).unwrap() {
                            let game = matches.get_group(l).unwrap().unwrap();
                            for member in party {
                                prop_assert!(game.members.contains(&member));
                            }
                        }
                    }
                    Op::Leave(p) => { matches.leave(p).unwrap(); }
                    Op::Kick(c, t) => { matches.kick_player(c, t).unwrap(); }
                    Op::Start(p) => {
                        if matches.start_match(p).unwrap() {
                            for member in matches.get_group(p).unwrap().unwrap().members {
                                prop_assert!(parties.get_group(member).unwrap().is_none());
                            }
                        }
                    }
                }

                prop_assert_eq!(parties.violation(), None);
                prop_assert_eq!(matches.violation(), None);
            }
        }
    }
}
