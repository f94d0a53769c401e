//! Leaderboard service
//!
//! Wraps the grader with the team registry, per-environment submission
//! limits and persistence. The grader itself is treated as a black box.

use crate::errors::{StorageError, SubmitError};
use crate::storage::LeaderboardStorage;
use crate::types::{LeaderboardEntry, Submission, Team, TeamHistory};
use chrono::Utc;
use hackboard_grader::Grader;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Random 32-character hex key for a new team
pub fn generate_team_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Register a team directly against storage. A random key is generated when
/// none is given.
pub fn register_team(
    storage: &dyn LeaderboardStorage,
    name: &str,
    key: Option<&str>,
) -> Result<Team, StorageError> {
    let key = match key {
        Some(key) => key.trim().to_string(),
        None => generate_team_key(),
    };
    let team = storage.create_team(name.trim(), &key)?;
    info!(team_id = team.id, name = %team.name, "registered team");
    Ok(team)
}

pub struct LeaderboardService {
    storage: Arc<dyn LeaderboardStorage>,
    grader: Arc<Grader>,
    environment: String,
    default_limit: u32,
    /// Serialises count-check, grading and persistence so a team cannot race
    /// past its limit.
    submit_lock: Mutex<()>,
}

impl LeaderboardService {
    pub fn new(
        storage: Arc<dyn LeaderboardStorage>,
        grader: Arc<Grader>,
        environment: impl Into<String>,
        default_limit: u32,
    ) -> Self {
        Self {
            storage,
            grader,
            environment: environment.into(),
            default_limit,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn grader(&self) -> &Grader {
        &self.grader
    }

    pub fn storage(&self) -> &Arc<dyn LeaderboardStorage> {
        &self.storage
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Active submission limit for the configured environment
    pub fn limit(&self) -> Result<u32, StorageError> {
        Ok(self
            .storage
            .get_limit(&self.environment)?
            .unwrap_or(self.default_limit))
    }

    pub fn set_limit(&self, limit: u32) -> Result<(), StorageError> {
        self.storage.set_limit(&self.environment, limit)?;
        info!(env = %self.environment, limit, "submission limit updated");
        Ok(())
    }

    /// Register a team. A random key is generated when none is given.
    pub fn register_team(&self, name: &str, key: Option<&str>) -> Result<Team, StorageError> {
        register_team(self.storage.as_ref(), name, key)
    }

    /// Grade an uploaded CSV and persist the score.
    ///
    /// Nothing is stored when any step fails.
    pub fn submit(&self, team_key: &str, upload: &[u8]) -> Result<Submission, SubmitError> {
        let result = self.try_submit(team_key, upload);
        let outcome = match &result {
            Ok(_) => "accepted",
            Err(err) => err.outcome(),
        };
        metrics::counter!("hackboard_submissions_total", "outcome" => outcome).increment(1);
        result
    }

    fn try_submit(&self, team_key: &str, upload: &[u8]) -> Result<Submission, SubmitError> {
        let _guard = self.submit_lock.lock();

        let team = self
            .storage
            .find_team_by_key(team_key.trim())?
            .ok_or(SubmitError::UnknownTeam)?;

        let limit = self.limit()?;
        let count = self.storage.count_submissions(team.id)?;
        if count + 1 > limit {
            warn!(team_id = team.id, count, limit, "submission limit reached");
            return Err(SubmitError::LimitExceeded { limit });
        }

        std::str::from_utf8(upload)?;
        let score = self.grader.grade_csv(upload).map_err(|err| {
            warn!(team_id = team.id, error = %err, "submission rejected");
            err
        })?;

        let submission = Submission {
            team_id: team.id,
            number: count + 1,
            score,
            submitted_at: Utc::now(),
            digest: blake3::hash(upload).to_hex().to_string(),
        };
        self.storage.store_submission(submission.clone())?;
        metrics::gauge!("hackboard_last_score", "team" => team.name.clone()).set(score);

        info!(
            team_id = team.id,
            number = submission.number,
            score,
            "submission accepted"
        );
        Ok(submission)
    }

    /// Ranking of every team with at least one submission, best score first.
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, StorageError> {
        let teams: BTreeMap<u64, Team> = self
            .storage
            .list_teams()?
            .into_iter()
            .map(|team| (team.id, team))
            .collect();

        let mut best: BTreeMap<u64, LeaderboardEntry> = BTreeMap::new();
        for submission in self.storage.all_submissions()? {
            let Some(team) = teams.get(&submission.team_id) else {
                continue;
            };
            let entry = best
                .entry(team.id)
                .or_insert_with(|| LeaderboardEntry {
                    rank: 0,
                    team_id: team.id,
                    team_name: team.name.clone(),
                    best_score: submission.score,
                    submissions: 0,
                    last_submitted_at: submission.submitted_at,
                });
            entry.submissions += 1;
            if submission.score > entry.best_score {
                entry.best_score = submission.score;
            }
            if submission.submitted_at > entry.last_submitted_at {
                entry.last_submitted_at = submission.submitted_at;
            }
        }

        let mut entries: Vec<LeaderboardEntry> = best.into_values().collect();
        entries.sort_by(|a, b| {
            b.best_score
                .total_cmp(&a.best_score)
                .then(a.submissions.cmp(&b.submissions))
                .then(a.team_id.cmp(&b.team_id))
        });
        for (position, entry) in entries.iter_mut().enumerate() {
            entry.rank = position + 1;
        }
        Ok(entries)
    }

    /// Every team with its submissions in order
    pub fn history(&self) -> Result<Vec<TeamHistory>, StorageError> {
        let mut history = Vec::new();
        for team in self.storage.list_teams()? {
            let submissions = self.storage.list_submissions(team.id)?;
            history.push(TeamHistory { team, submissions });
        }
        Ok(history)
    }

    pub fn team_history(&self, team_id: u64) -> Result<Option<TeamHistory>, StorageError> {
        match self.storage.get_team(team_id)? {
            Some(team) => {
                let submissions = self.storage.list_submissions(team.id)?;
                Ok(Some(TeamHistory { team, submissions }))
            }
            None => Ok(None),
        }
    }
}
