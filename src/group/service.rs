//! Generic group membership engine
//!
//! `GroupMembershipService<G>` maps every participant to the one group of
//! kind `G` they belong to. Groups are keyed by their leader, so a
//! participant id is either absent, a leader key, or a member pointing at a
//! leader key. All compound updates (leave-then-add on join, disband on
//! leader exit) happen under a single write lock.

use crate::error::{MatchmakingError, Result};
use crate::group::entity::{GroupEntity, GroupSnapshot};
use crate::group::friends::FriendshipOracle;
use crate::metrics::MetricsCollector;
use crate::types::{ParticipantId, Privacy};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Kind-specific join rules
pub trait JoinPolicy<G: GroupEntity>: Send + Sync {
    /// Participants that move into the target group when `joiner` joins,
    /// `joiner` included. `None` rejects the join.
    fn travellers(
        &self,
        state: &MembershipState<G>,
        joiner: ParticipantId,
    ) -> Option<Vec<ParticipantId>>;

    /// Participants pulled into a freshly created group next to its leader
    fn founders(&self, _state: &MembershipState<G>, _leader: ParticipantId) -> Vec<ParticipantId> {
        Vec::new()
    }
}

/// Why `admit` turned a joiner away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoSuchGroup,
    Private,
    NotFriend,
    WrongPassword,
}

/// Groups of one kind plus the participant index
#[derive(Debug)]
pub struct MembershipState<G> {
    /// Leader -> group
    groups: HashMap<ParticipantId, G>,
    /// Participant -> leader of the group they belong to
    index: HashMap<ParticipantId, ParticipantId>,
}

impl<G> Default for MembershipState<G> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<G: GroupEntity> MembershipState<G> {
    pub fn group_of(&self, participant: ParticipantId) -> Option<&G> {
        self.index
            .get(&participant)
            .and_then(|leader| self.groups.get(leader))
    }

    fn group_of_mut(&mut self, participant: ParticipantId) -> Option<&mut G> {
        let leader = *self.index.get(&participant)?;
        self.groups.get_mut(&leader)
    }

    pub fn is_leader(&self, participant: ParticipantId) -> bool {
        self.group_of(participant)
            .map(|group| group.leader() == participant)
            .unwrap_or(false)
    }

    /// Every member of `participant`'s group, empty if they have none
    pub fn players(&self, participant: ParticipantId) -> Vec<ParticipantId> {
        self.group_of(participant)
            .map(|group| group.members().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn participant_count(&self) -> usize {
        self.index.len()
    }

    fn register(&mut self, group: G) -> bool {
        let leader = group.leader();
        if self.index.contains_key(&leader) {
            return false;
        }
        self.index.insert(leader, leader);
        self.groups.insert(leader, group);
        true
    }

    /// Move `joiner` into `leader`'s group, leaving any current group first
    fn add_player(&mut self, joiner: ParticipantId, leader: ParticipantId) -> bool {
        if !self.is_leader(leader) {
            return false;
        }
        match self.groups.get(&leader) {
            Some(group) if !group.accepts_joins() => return false,
            Some(group) if group.contains(joiner) => return true,
            Some(_) => {}
            None => return false,
        }

        self.leave(joiner);

        match self.groups.get_mut(&leader) {
            Some(group) => {
                group.add_member(joiner);
                self.index.insert(joiner, leader);
                true
            }
            None => false,
        }
    }

    /// Remove `participant` from their group. A departing leader disbands
    /// the group since membership is addressed by leader.
    fn leave(&mut self, participant: ParticipantId) -> bool {
        let Some(leader) = self.index.remove(&participant) else {
            return false;
        };

        if leader == participant {
            if let Some(group) = self.groups.remove(&leader) {
                for member in group.members() {
                    self.index.remove(member);
                }
            }
            return true;
        }

        let now_empty = match self.groups.get_mut(&leader) {
            Some(group) => {
                group.remove_member(participant);
                group.members().is_empty()
            }
            None => false,
        };
        if now_empty {
            self.groups.remove(&leader);
        }
        true
    }

    /// Privacy gate; the invite list bypasses it
    fn admit(
        &self,
        joiner: ParticipantId,
        leader: ParticipantId,
        password: Option<&str>,
        friendships: &dyn FriendshipOracle,
    ) -> std::result::Result<(), Rejection> {
        if !self.is_leader(leader) {
            return Err(Rejection::NoSuchGroup);
        }
        let group = self.groups.get(&leader).ok_or(Rejection::NoSuchGroup)?;

        if group.is_invited(joiner) {
            return Ok(());
        }

        match group.privacy() {
            Privacy::Private => Err(Rejection::Private),
            Privacy::FriendsOnly if !friendships.is_friend_of(joiner, leader) => {
                Err(Rejection::NotFriend)
            }
            Privacy::FriendsOnly => Ok(()),
            Privacy::Password if password != group.password() || password.is_none() => {
                Err(Rejection::WrongPassword)
            }
            Privacy::Password | Privacy::Public => Ok(()),
        }
    }
}

#[cfg(test)]
impl<G: GroupEntity> MembershipState<G> {
    /// First broken exclusivity or leader invariant, if any
    pub(crate) fn violation(&self) -> Option<String> {
        let mut seen = std::collections::HashSet::new();
        for (leader, group) in &self.groups {
            if group.leader() != *leader || !group.contains(*leader) {
                return Some(format!("group keyed by {} is led by {}", leader, group.leader()));
            }
            for member in group.members() {
                if !seen.insert(*member) {
                    return Some(format!("{} belongs to two groups", member));
                }
                if self.index.get(member) != Some(leader) {
                    return Some(format!("index of {} does not point at {}", member, leader));
                }
            }
        }
        if seen.len() != self.index.len() {
            return Some("index holds participants outside every group".to_string());
        }
        None
    }
}

/// Membership service for one group kind
pub struct GroupMembershipService<G: GroupEntity> {
    state: RwLock<MembershipState<G>>,
    policy: Arc<dyn JoinPolicy<G>>,
    friendships: Arc<dyn FriendshipOracle>,
    metrics: Arc<MetricsCollector>,
}

impl<G: GroupEntity> GroupMembershipService<G> {
    pub fn new(
        policy: Arc<dyn JoinPolicy<G>>,
        friendships: Arc<dyn FriendshipOracle>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            state: RwLock::new(MembershipState::default()),
            policy,
            friendships,
            metrics,
        }
    }

    pub(crate) fn read_state(&self) -> Result<RwLockReadGuard<'_, MembershipState<G>>> {
        self.state
            .read()
            .map_err(|_| MatchmakingError::poisoned(G::KIND.as_str()).into())
    }

    pub(crate) fn write_state(&self) -> Result<RwLockWriteGuard<'_, MembershipState<G>>> {
        self.state
            .write()
            .map_err(|_| MatchmakingError::poisoned(G::KIND.as_str()).into())
    }

    pub(crate) fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Create a group led by `leader`. Fails if the leader already belongs
    /// to a group of this kind.
    pub fn create(&self, leader: ParticipantId) -> Result<bool> {
        let mut state = self.write_state()?;

        if !state.register(G::create(leader)) {
            debug!("{} create rejected: {} already grouped", G::KIND, leader);
            return Ok(false);
        }

        for founder in self.policy.founders(&state, leader) {
            if founder != leader {
                state.add_player(founder, leader);
            }
        }

        let size = state.players(leader).len();
        self.metrics.record_group_created(G::KIND);
        self.metrics.set_active_groups(G::KIND, state.group_count());
        info!("Created {} led by {} with {} member(s)", G::KIND, leader, size);
        Ok(true)
    }

    pub fn get_group(&self, participant: ParticipantId) -> Result<Option<GroupSnapshot>> {
        Ok(self.read_state()?.group_of(participant).map(|g| g.snapshot()))
    }

    pub fn is_leader(&self, participant: ParticipantId) -> Result<bool> {
        Ok(self.read_state()?.is_leader(participant))
    }

    pub fn get_players(&self, participant: ParticipantId) -> Result<Vec<ParticipantId>> {
        Ok(self.read_state()?.players(participant))
    }

    /// Privacy-gated join into `leader`'s group
    pub fn request_join(
        &self,
        joiner: ParticipantId,
        leader: ParticipantId,
        password: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.write_state()?;

        if let Err(rejection) = state.admit(joiner, leader, password, self.friendships.as_ref()) {
            debug!(
                "{} join of {} into {} rejected: {:?}",
                G::KIND,
                joiner,
                leader,
                rejection
            );
            self.metrics.record_join(G::KIND, false);
            return Ok(false);
        }

        let joined = self.join_locked(&mut state, joiner, leader);
        self.metrics.record_join(G::KIND, joined);
        self.metrics.set_active_groups(G::KIND, state.group_count());
        Ok(joined)
    }

    /// Kind-specific join without the privacy gate
    pub fn join(&self, joiner: ParticipantId, leader: ParticipantId) -> Result<bool> {
        let mut state = self.write_state()?;
        let joined = self.join_locked(&mut state, joiner, leader);
        self.metrics.record_join(G::KIND, joined);
        self.metrics.set_active_groups(G::KIND, state.group_count());
        Ok(joined)
    }

    fn join_locked(
        &self,
        state: &mut MembershipState<G>,
        joiner: ParticipantId,
        leader: ParticipantId,
    ) -> bool {
        if joiner == leader || !state.is_leader(leader) {
            return false;
        }

        let Some(travellers) = self.policy.travellers(state, joiner) else {
            debug!("{} join of {} into {} refused by policy", G::KIND, joiner, leader);
            return false;
        };

        let mut all_joined = !travellers.is_empty();
        for traveller in travellers {
            if !state.add_player(traveller, leader) {
                warn!("Failed to move {} into {} of {}", traveller, G::KIND, leader);
                all_joined = false;
            }
        }

        if all_joined {
            info!("{} joined {} of {}", joiner, G::KIND, leader);
        }
        all_joined
    }

    /// Single-participant add, leaving any current group first
    pub fn add_player(&self, joiner: ParticipantId, leader: ParticipantId) -> Result<bool> {
        let mut state = self.write_state()?;
        let added = state.add_player(joiner, leader);
        self.metrics.set_active_groups(G::KIND, state.group_count());
        Ok(added)
    }

    pub fn leave(&self, participant: ParticipantId) -> Result<bool> {
        let mut state = self.write_state()?;
        let left = state.leave(participant);
        if left {
            debug!("{} left their {}", participant, G::KIND);
            self.metrics.record_leave(G::KIND);
            self.metrics.set_active_groups(G::KIND, state.group_count());
        }
        Ok(left)
    }

    /// Remove `target` if `caller` leads target's group
    pub fn kick_player(&self, caller: ParticipantId, target: ParticipantId) -> Result<bool> {
        let mut state = self.write_state()?;

        let authorised = state
            .group_of(target)
            .map(|group| group.leader() == caller)
            .unwrap_or(false);
        if !authorised {
            debug!("{} kick of {} by {} rejected", G::KIND, target, caller);
            return Ok(false);
        }

        let kicked = state.leave(target);
        if kicked {
            info!("{} kicked {} from their {}", caller, target, G::KIND);
            self.metrics.record_kick(G::KIND);
            self.metrics.set_active_groups(G::KIND, state.group_count());
        }
        Ok(kicked)
    }

    /// `Password` privacy requires a password in the same call
    pub fn set_privacy(
        &self,
        caller: ParticipantId,
        privacy: Privacy,
        password: Option<String>,
    ) -> Result<bool> {
        if privacy == Privacy::Password && password.is_none() {
            return Ok(false);
        }
        self.modify_as_leader(caller, |group| {
            group.set_privacy(privacy);
            if let Some(password) = password {
                if privacy == Privacy::Password {
                    group.set_password(password);
                }
            }
        })
    }

    pub fn set_password(&self, caller: ParticipantId, password: String) -> Result<bool> {
        self.modify_as_leader(caller, |group| group.set_password(password))
    }

    /// Any current member may invite into their own group
    pub fn invite_player(&self, caller: ParticipantId, invitee: ParticipantId) -> Result<bool> {
        let mut state = self.write_state()?;
        match state.group_of_mut(caller) {
            Some(group) => {
                group.invite(invitee);
                debug!("{} invited {} to their {}", caller, invitee, G::KIND);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove `participant` if their current group matches `filter`. A
    /// leader taken out this way disbands their group.
    pub(crate) fn release_if<F>(&self, participant: ParticipantId, filter: F) -> Result<bool>
    where
        F: FnOnce(&G) -> bool,
    {
        let mut state = self.write_state()?;
        if !state.group_of(participant).is_some_and(filter) {
            return Ok(false);
        }
        let released = state.leave(participant);
        if released {
            self.metrics.record_leave(G::KIND);
            self.metrics.set_active_groups(G::KIND, state.group_count());
        }
        Ok(released)
    }

    /// Apply `change` to the caller's group if they lead it
    pub(crate) fn modify_as_leader<F>(&self, caller: ParticipantId, change: F) -> Result<bool>
    where
        F: FnOnce(&mut G),
    {
        Ok(self.with_leader_group(caller, change)?.is_some())
    }

    /// Run `f` on the caller's group if they lead it, `None` otherwise
    pub(crate) fn with_leader_group<F, R>(&self, caller: ParticipantId, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut G) -> R,
    {
        let mut state = self.write_state()?;
        match state.group_of_mut(caller) {
            Some(group) if group.leader() == caller => Ok(Some(f(group))),
            _ => Ok(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn violation(&self) -> Option<String> {
        match self.read_state() {
            Ok(state) => state.violation(),
            Err(e) => Some(e.to_string()),
        }
    }

    pub fn group_count(&self) -> Result<usize> {
        Ok(self.read_state()?.group_count())
    }

    pub fn participant_count(&self) -> Result<usize> {
        Ok(self.read_state()?.participant_count())
    }
}
