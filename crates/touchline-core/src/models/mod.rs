//! Data models shared across the engine.
//!
//! - [`EntityType`]: the kinds of upstream entities the engine tracks
//! - Typed upstream payloads (competitions, teams, matches, standings)

mod entity;
mod football;

pub use entity::{EntityType, SyncTarget};
pub use football::{
    Area, Competition, CompetitionsResponse, Match, MatchesResponse, Score, ScoreData, Season,
    Standing, StandingTable, Team, TeamStanding,
};
