//! Catalog entity types.
//!
//! Each entity type is a thin binding over the generic engine: it only
//! contributes the remote path segment and the local table name.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of reference data mirrored from the remote catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Competitions (leagues, cups, tournaments).
    Competition,
    /// Players.
    Player,
    /// Stages of a competition.
    Stage,
    /// Venues.
    Venue,
}

impl EntityType {
    /// Every entity type, in the order a full sync walks them.
    pub const ALL: [EntityType; 4] = [
        EntityType::Competition,
        EntityType::Player,
        EntityType::Stage,
        EntityType::Venue,
    ];

    /// Singular lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            EntityType::Competition => "competition",
            EntityType::Player => "player",
            EntityType::Stage => "stage",
            EntityType::Venue => "venue",
        }
    }

    /// Path segment of the remote listing endpoint.
    pub fn remote_path(&self) -> &'static str {
        match self {
            EntityType::Competition => "competitions",
            EntityType::Player => "players",
            EntityType::Stage => "stages",
            EntityType::Venue => "venues",
        }
    }

    /// Name of the local table holding this entity type.
    pub fn table_name(&self) -> &'static str {
        self.remote_path()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        EntityType::ALL
            .into_iter()
            .find(|e| e.name() == lower || e.remote_path() == lower)
            .ok_or_else(|| SyncError::UnknownEntity(s.to_string()))
    }
}
