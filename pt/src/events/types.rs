//! Inbound game event types
//!
//! Events are what the in-world feed delivers: actions being cast and
//! zone transitions. They are serde-derived so a recorded JSONL log can
//! be replayed through the same pipeline the live feed drives.

use serde::{Deserialize, Serialize};

use crate::domain::{ActionId, LocationId};

/// Snapshot of the entity that performed an action
///
/// Carries just enough to apply source filtering and, when no allowed
/// set is available, the health-total heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub max_hp: u64,
    #[serde(default)]
    pub hostile: bool,
    #[serde(default)]
    pub local_player: bool,
    #[serde(default)]
    pub party_member: bool,
}

/// One item from the in-world event feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GameEvent {
    /// An action resolved in the world
    ///
    /// Action and source are optional because the feed cannot always
    /// resolve them; such events are dropped by the tracker.
    ActionCast {
        #[serde(default)]
        action: Option<ActionId>,
        #[serde(default)]
        source: Option<ActorInfo>,
        location: LocationId,
    },

    /// The player moved to a new location
    ZoneChanged { location: LocationId },
}

impl GameEvent {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ActionCast { .. } => "ActionCast",
            Self::ZoneChanged { .. } => "ZoneChanged",
        }
    }

    pub fn location(&self) -> LocationId {
        match self {
            Self::ActionCast { location, .. } => *location,
            Self::ZoneChanged { location } => *location,
        }
    }
}
