//! Duty catalog lookup
//!
//! Read-only reference data: which locations map to which duty, and the
//! descriptor for each duty. The trait is the seam; [`StaticDutyLookup`]
//! serves an in-memory table, loadable from a YAML catalog file.

use std::collections::HashMap;
use std::path::Path;

use eyre::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::domain::{DutyDescriptor, DutyId, DutyKind, LocationId};

pub trait DutyLookup: Send + Sync {
    /// Map a location to the duty it hosts, if any
    fn duty_for_location(&self, location: LocationId) -> Option<DutyId>;

    /// Descriptor for a duty
    fn descriptor(&self, duty: DutyId) -> Option<DutyDescriptor>;

    /// Every known duty
    fn all_duties(&self) -> Vec<DutyDescriptor>;
}

/// One duty entry in the catalog file
#[derive(Debug, Deserialize)]
pub struct DutyEntry {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub kind: DutyKind,
    #[serde(default)]
    pub locations: Vec<u32>,
}

/// In-memory duty catalog
#[derive(Debug, Default)]
pub struct StaticDutyLookup {
    duties: HashMap<DutyId, DutyDescriptor>,
    by_location: HashMap<LocationId, DutyId>,
}

impl StaticDutyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a duty and the locations that map to it
    pub fn insert(&mut self, descriptor: DutyDescriptor, locations: &[LocationId]) {
        for location in locations {
            self.by_location.insert(*location, descriptor.id);
        }
        self.duties.insert(descriptor.id, descriptor);
    }

    pub fn from_entries(entries: Vec<DutyEntry>) -> Self {
        let mut lookup = Self::new();
        for entry in entries {
            let locations: Vec<LocationId> = entry.locations.iter().map(|raw| LocationId(*raw)).collect();
            lookup.insert(
                DutyDescriptor {
                    id: DutyId(entry.id),
                    name: entry.name,
                    kind: entry.kind,
                },
                &locations,
            );
        }
        lookup
    }

    /// Load the catalog from a YAML file (a list of duty entries)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read duty catalog from {}", path.as_ref().display()))?;
        let entries: Vec<DutyEntry> =
            serde_yaml::from_str(&content).context("Failed to parse duty catalog")?;

        let lookup = Self::from_entries(entries);
        info!(
            duties = lookup.duties.len(),
            path = %path.as_ref().display(),
            "Loaded duty catalog"
        );
        Ok(lookup)
    }

    pub fn len(&self) -> usize {
        self.duties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.duties.is_empty()
    }
}

impl DutyLookup for StaticDutyLookup {
    fn duty_for_location(&self, location: LocationId) -> Option<DutyId> {
        self.by_location.get(&location).copied()
    }

    fn descriptor(&self, duty: DutyId) -> Option<DutyDescriptor> {
        self.duties.get(&duty).cloned()
    }

    fn all_duties(&self) -> Vec<DutyDescriptor> {
        let mut duties: Vec<DutyDescriptor> = self.duties.values().cloned().collect();
        duties.sort_by_key(|descriptor| descriptor.id);
        duties
    }
}
