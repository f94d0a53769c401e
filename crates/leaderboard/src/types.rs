//! Leaderboard records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    /// Secret used to authenticate uploads; never rendered
    #[serde(skip_serializing, default)]
    pub key: String,
}

/// A scored submission. Predictions themselves are not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub team_id: u64,
    /// 1-based sequence number within the team
    pub number: u32,
    pub score: f64,
    pub submitted_at: DateTime<Utc>,
    /// BLAKE3 hex digest of the uploaded file
    pub digest: String,
}

/// One row of the ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub team_id: u64,
    pub team_name: String,
    pub best_score: f64,
    pub submissions: u32,
    pub last_submitted_at: DateTime<Utc>,
}

/// A team together with its submissions, ordered by number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamHistory {
    pub team: Team,
    pub submissions: Vec<Submission>,
}
