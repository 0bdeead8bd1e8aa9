//! Core identifiers and catalog descriptors
//!
//! Ids are opaque newtypes around the raw numeric identifiers the game
//! assigns. An `ActionId` is only meaningful within the scope of a duty:
//! the same raw value can name different milestones in different duties.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a trackable duty (dungeon, trial, raid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DutyId(pub u32);

/// Identifier of a progress-point action within a duty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u32);

/// Identifier of an in-game location (territory/zone)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub u32);

impl fmt::Display for DutyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DutyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(DutyId)
            .map_err(|_| format!("invalid duty id: {}", s))
    }
}

impl FromStr for ActionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(ActionId)
            .map_err(|_| format!("invalid action id: {}", s))
    }
}

/// Whether a duty is backed by the remote service or client-only
///
/// Custom duties exist only in the local catalog; the remote service has
/// no record of them, so reconciliation passes skip them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DutyKind {
    #[default]
    Registered,
    Custom,
}

/// Catalog entry describing one trackable duty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyDescriptor {
    pub id: DutyId,
    pub name: String,
    #[serde(default)]
    pub kind: DutyKind,
}

impl DutyDescriptor {
    pub fn is_custom(&self) -> bool {
        self.kind == DutyKind::Custom
    }
}

/// One progress point as served by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgPoint {
    pub id: ActionId,
    pub name: String,
    pub completed: bool,
}
