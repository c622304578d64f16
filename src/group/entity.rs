//! Group entities: the capability contract shared by parties and matches
//!
//! A group is a leader plus a member set with privacy controls. `GroupCore`
//! holds that shared state; `Party` and `Match` wrap it and the
//! `GroupEntity` trait exposes it to the generic membership service.

use crate::types::{GroupKind, MatchSettings, ParticipantId, Privacy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// State every group kind carries
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCore {
    leader: ParticipantId,
    members: BTreeSet<ParticipantId>,
    privacy: Privacy,
    password: Option<String>,
    invited: BTreeSet<ParticipantId>,
}

impl GroupCore {
    /// New public group containing only its leader
    pub fn new(leader: ParticipantId) -> Self {
        Self {
            leader,
            members: BTreeSet::from([leader]),
            privacy: Privacy::Public,
            password: None,
            invited: BTreeSet::new(),
        }
    }
}

/// Capability contract for a group kind.
///
/// Implementors only provide access to their `GroupCore` plus a factory;
/// everything else has a shared default.
pub trait GroupEntity: Clone + Send + Sync + 'static {
    const KIND: GroupKind;

    /// Kind-specific factory
    fn create(leader: ParticipantId) -> Self;

    fn core(&self) -> &GroupCore;

    fn core_mut(&mut self) -> &mut GroupCore;

    /// Whether new members may still be added
    fn accepts_joins(&self) -> bool {
        true
    }

    fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot::from_core(Self::KIND, self.core())
    }

    fn leader(&self) -> ParticipantId {
        self.core().leader
    }

    fn members(&self) -> &BTreeSet<ParticipantId> {
        &self.core().members
    }

    fn contains(&self, participant: ParticipantId) -> bool {
        self.core().members.contains(&participant)
    }

    fn add_member(&mut self, participant: ParticipantId) {
        self.core_mut().members.insert(participant);
    }

    /// Returns false if the participant was not a member
    fn remove_member(&mut self, participant: ParticipantId) -> bool {
        self.core_mut().members.remove(&participant)
    }

    fn privacy(&self) -> Privacy {
        self.core().privacy
    }

    fn set_privacy(&mut self, privacy: Privacy) {
        self.core_mut().privacy = privacy;
    }

    fn password(&self) -> Option<&str> {
        self.core().password.as_deref()
    }

    fn set_password(&mut self, password: String) {
        self.core_mut().password = Some(password);
    }

    fn is_invited(&self, participant: ParticipantId) -> bool {
        self.core().invited.contains(&participant)
    }

    fn invite(&mut self, participant: ParticipantId) {
        self.core_mut().invited.insert(participant);
    }
}

/// A party: participants that queue and travel together
#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    core: GroupCore,
}

impl GroupEntity for Party {
    const KIND: GroupKind = GroupKind::Party;

    fn create(leader: ParticipantId) -> Self {
        Self {
            core: GroupCore::new(leader),
        }
    }

    fn core(&self) -> &GroupCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GroupCore {
        &mut self.core
    }
}

/// A match: a group with settings that is sealed once started
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    core: GroupCore,
    settings: MatchSettings,
    started: bool,
}

impl Match {
    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: MatchSettings) {
        self.settings = settings;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// One-way transition
    pub fn mark_started(&mut self) {
        self.started = true;
    }
}

impl GroupEntity for Match {
    const KIND: GroupKind = GroupKind::Match;

    fn create(leader: ParticipantId) -> Self {
        Self {
            core: GroupCore::new(leader),
            settings: MatchSettings::default(),
            started: false,
        }
    }

    fn core(&self) -> &GroupCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GroupCore {
        &mut self.core
    }

    fn accepts_joins(&self) -> bool {
        !self.started
    }

    fn snapshot(&self) -> GroupSnapshot {
        let mut snapshot = GroupSnapshot::from_core(Self::KIND, &self.core);
        snapshot.settings = Some(self.settings.clone());
        snapshot.started = Some(self.started);
        snapshot
    }
}

/// Read-only view of a group handed out of the membership lock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub kind: GroupKind,
    pub leader: ParticipantId,
    pub members: Vec<ParticipantId>,
    pub privacy: Privacy,
    pub has_password: bool,
    pub invited: Vec<ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<MatchSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started: Option<bool>,
}

impl GroupSnapshot {
    fn from_core(kind: GroupKind, core: &GroupCore) -> Self {
        Self {
            kind,
            leader: core.leader,
            members: core.members.iter().copied().collect(),
            privacy: core.privacy,
            has_password: core.password.is_some(),
            invited: core.invited.iter().copied().collect(),
            settings: None,
            started: None,
        }
    }
}
