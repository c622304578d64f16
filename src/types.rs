//! Common types used throughout the party and matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MatchmakingError;

/// Stable identifier for a connected participant (session / account id)
pub type ParticipantId = u64;

/// Unique identifier for a formed match
pub type MatchId = Uuid;

/// Admission mode of a party or match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Public,
    FriendsOnly,
    Password,
    Private,
}

impl std::fmt::Display for Privacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Privacy::Public => write!(f, "Public"),
            Privacy::FriendsOnly => write!(f, "FriendsOnly"),
            Privacy::Password => write!(f, "Password"),
            Privacy::Private => write!(f, "Private"),
        }
    }
}

/// The two kinds of player group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    Party,
    Match,
}

impl GroupKind {
    /// Metric / log label
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Party => "party",
            GroupKind::Match => "match",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target match size of a matchmaking queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueueSize {
    Duo,
    Squad,
}

impl QueueSize {
    pub const ALL: [QueueSize; 2] = [QueueSize::Duo, QueueSize::Squad];

    /// Exact number of participants a match from this queue holds
    pub fn target(&self) -> usize {
        match self {
            QueueSize::Duo => 2,
            QueueSize::Squad => 4,
        }
    }

    /// Namespace of the ordered store backing this queue
    pub fn store_name(&self) -> &'static str {
        match self {
            QueueSize::Duo => "MatchQueue2",
            QueueSize::Squad => "MatchQueue4",
        }
    }
}

impl TryFrom<usize> for QueueSize {
    type Error = MatchmakingError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        match size {
            2 => Ok(QueueSize::Duo),
            4 => Ok(QueueSize::Squad),
            _ => Err(MatchmakingError::UnknownQueueSize { size }),
        }
    }
}

impl std::fmt::Display for QueueSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target())
    }
}

/// Opaque match settings, passed through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchSettings(pub serde_json::Value);

/// Event emitted when the queue promotes a set of parties into a started match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFormed {
    pub match_id: MatchId,
    pub leader: ParticipantId,
    /// Leaders of the parties that were merged, in selection order
    pub party_leaders: Vec<ParticipantId>,
    pub members: Vec<ParticipantId>,
    pub target_size: QueueSize,
    /// True when a selected party vanished and the match started short
    pub under_filled: bool,
    pub formed_at: DateTime<Utc>,
}
