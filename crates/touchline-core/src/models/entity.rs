//! Entity types and sync targets.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::models::football::{Competition, MatchesResponse, Standing, Team};

/// Kind of upstream entity tracked by the freshness engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Competition,
    Team,
    Matches,
    Standings,
    #[serde(rename = "head2head")]
    HeadToHead,
}

impl EntityType {
    /// All entity types, in the order a tick syncs them for one competition.
    pub const ALL: [EntityType; 5] = [
        EntityType::Competition,
        EntityType::Matches,
        EntityType::Standings,
        EntityType::Team,
        EntityType::HeadToHead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Competition => "competition",
            EntityType::Team => "team",
            EntityType::Matches => "matches",
            EntityType::Standings => "standings",
            EntityType::HeadToHead => "head2head",
        }
    }

    /// Upstream resource path for an entity of this type.
    pub fn resource_path(&self, key: &str) -> String {
        match self {
            EntityType::Competition => format!("/competitions/{}", key),
            EntityType::Team => format!("/teams/{}", key),
            EntityType::Matches => format!("/competitions/{}/matches", key),
            EntityType::Standings => format!("/competitions/{}/standings", key),
            EntityType::HeadToHead => format!("/matches/{}/head2head", key),
        }
    }

    /// Decode a payload into the typed model for this entity type.
    ///
    /// Used to reject malformed payloads before they reach persistence.
    pub fn validate_payload(&self, payload: &[u8]) -> Result<()> {
        let decoded = match self {
            EntityType::Competition => serde_json::from_slice::<Competition>(payload).map(|_| ()),
            EntityType::Team => serde_json::from_slice::<Team>(payload).map(|_| ()),
            EntityType::Matches => serde_json::from_slice::<MatchesResponse>(payload).map(|_| ()),
            EntityType::Standings => serde_json::from_slice::<Standing>(payload).map(|_| ()),
            EntityType::HeadToHead => {
                serde_json::from_slice::<serde_json::Value>(payload).map(|_| ())
            }
        };
        decoded.map_err(|e| SyncError::decode(self.as_str(), e))
    }
}

impl std::str::FromStr for EntityType {
    type Err = SyncError;

    /// Accepts the canonical names plus common plurals and aliases,
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "competition" | "competitions" => Ok(EntityType::Competition),
            "team" | "teams" => Ok(EntityType::Team),
            "matches" | "match" => Ok(EntityType::Matches),
            "standings" => Ok(EntityType::Standings),
            "head2head" | "head-to-head" | "h2h" => Ok(EntityType::HeadToHead),
            _ => Err(SyncError::Config {
                message: format!("unknown entity type '{}'", s.trim()),
            }),
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (entity type, key) pair the scheduler checks on a tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncTarget {
    pub entity_type: EntityType,
    pub key: String,
}

impl SyncTarget {
    pub fn new(entity_type: EntityType, key: impl Into<String>) -> Self {
        Self {
            entity_type,
            key: key.into(),
        }
    }

    /// Upstream resource path for this target.
    pub fn resource_path(&self) -> String {
        self.entity_type.resource_path(&self.key)
    }

    /// Targets for one competition, in sync order.
    pub fn for_competition(code: &str) -> [SyncTarget; 3] {
        [
            SyncTarget::new(EntityType::Competition, code),
            SyncTarget::new(EntityType::Matches, code),
            SyncTarget::new(EntityType::Standings, code),
        ]
    }
}

impl std::fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.key)
    }
}
