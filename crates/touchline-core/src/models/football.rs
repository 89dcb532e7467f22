//! Typed payloads returned by the football-data API.
//!
//! Only the fields the engine and its callers read are modelled; unknown
//! fields are ignored so upstream additions do not break decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographical area (country or region).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Area {
    pub id: u64,
    pub name: String,
    pub code: Option<String>,
    pub flag: Option<String>,
}

/// A football club.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub tla: Option<String>,
    #[serde(default)]
    pub crest: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub founded: Option<u32>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// A competition season.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Season {
    pub id: u64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub current_matchday: Option<u32>,
}

/// A league or cup competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub emblem: Option<String>,
    #[serde(default)]
    pub area: Option<Area>,
    #[serde(default)]
    pub current_season: Option<Season>,
}

/// Home/away goal counts; `None` until the match has started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreData {
    pub home: Option<u32>,
    pub away: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Score {
    pub winner: Option<String>,
    pub duration: Option<String>,
    pub full_time: ScoreData,
    pub half_time: ScoreData,
}

/// A single fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: u64,
    #[serde(rename = "utcDate")]
    pub utc_date: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub matchday: Option<u32>,
    #[serde(default)]
    pub stage: Option<String>,
    pub home_team: Team,
    pub away_team: Team,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Match {
    /// Whether the match result is final.
    pub fn is_finished(&self) -> bool {
        self.status.eq_ignore_ascii_case("FINISHED")
    }
}

/// One row of a league table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamStanding {
    pub position: u32,
    pub team: Team,
    #[serde(default)]
    pub played_games: u32,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub won: u32,
    #[serde(default)]
    pub draw: u32,
    #[serde(default)]
    pub lost: u32,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub goals_for: u32,
    #[serde(default)]
    pub goals_against: u32,
    #[serde(default)]
    pub goal_difference: i32,
}

/// A league table for one stage/group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingTable {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    pub table: Vec<TeamStanding>,
}

/// Standings for a competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    #[serde(default)]
    pub competition: Option<Competition>,
    #[serde(default)]
    pub season: Option<Season>,
    pub standings: Vec<StandingTable>,
}

/// Response wrapper for `/competitions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionsResponse {
    #[serde(default)]
    pub count: u32,
    pub competitions: Vec<Competition>,
}

/// Response wrapper for `/competitions/{code}/matches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchesResponse {
    #[serde(default)]
    pub count: u32,
    pub matches: Vec<Match>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_competition_ignores_unknown_fields() {
        let json = r#"{
            "id": 2021,
            "name": "Premier League",
            "code": "PL",
            "type": "LEAGUE",
            "area": {"id": 2072, "name": "England", "code": "ENG"},
            "currentSeason": {"id": 2287, "startDate": "2024-08-16", "currentMatchday": 12},
            "lastUpdated": "2024-11-20T00:00:00Z",
            "seasons": []
        }"#;
        let comp: Competition = serde_json::from_str(json).unwrap();
        assert_eq!(comp.code.as_deref(), Some("PL"));
        assert_eq!(comp.kind.as_deref(), Some("LEAGUE"));
        assert_eq!(comp.current_season.unwrap().current_matchday, Some(12));
    }

    #[test]
    fn test_decode_matches_response() {
        let json = r#"{
            "count": 1,
            "matches": [{
                "id": 497410,
                "utcDate": "2024-08-16T19:00:00Z",
                "status": "FINISHED",
                "matchday": 1,
                "homeTeam": {"id": 66, "name": "Manchester United FC"},
                "awayTeam": {"id": 63, "name": "Fulham FC"},
                "score": {"winner": "HOME_TEAM", "fullTime": {"home": 1, "away": 0}}
            }]
        }"#;
        let resp: MatchesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.matches.len(), 1);
        assert!(resp.matches[0].is_finished());
        assert_eq!(resp.matches[0].score.full_time.home, Some(1));
    }

    #[test]
    fn test_decode_standings_requires_table() {
        let missing = r#"{"competition": {"id": 2021, "name": "Premier League"}}"#;
        assert!(serde_json::from_str::<Standing>(missing).is_err());

        let ok = r#"{"standings": [{"stage": "REGULAR_SEASON", "type": "TOTAL", "table": [
            {"position": 1, "team": {"id": 64, "name": "Liverpool FC"}, "points": 28}
        ]}]}"#;
        let standing: Standing = serde_json::from_str(ok).unwrap();
        assert_eq!(standing.standings[0].table[0].points, 28);
    }
}
