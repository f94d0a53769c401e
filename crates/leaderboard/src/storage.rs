use crate::errors::{StorageError, StorageResult};
use crate::types::{Submission, Team};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Abstract storage trait
pub trait LeaderboardStorage: Send + Sync {
    fn create_team(&self, name: &str, key: &str) -> StorageResult<Team>;
    fn get_team(&self, id: u64) -> StorageResult<Option<Team>>;
    fn find_team_by_key(&self, key: &str) -> StorageResult<Option<Team>>;
    fn list_teams(&self) -> StorageResult<Vec<Team>>;

    fn store_submission(&self, submission: Submission) -> StorageResult<()>;
    fn list_submissions(&self, team_id: u64) -> StorageResult<Vec<Submission>>;
    fn count_submissions(&self, team_id: u64) -> StorageResult<u32>;
    fn all_submissions(&self) -> StorageResult<Vec<Submission>>;

    /// Submission limit for an environment such as `production`
    fn get_limit(&self, env: &str) -> StorageResult<Option<u32>>;
    fn set_limit(&self, env: &str, limit: u32) -> StorageResult<()>;

    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// On-disk team record; unlike [`Team`] it keeps the key when serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTeam {
    id: u64,
    name: String,
    key: String,
}

impl From<StoredTeam> for Team {
    fn from(stored: StoredTeam) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            key: stored.key,
        }
    }
}

fn submission_key(team_id: u64, number: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&team_id.to_be_bytes());
    key[8..].copy_from_slice(&number.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> StorageResult<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StorageError::Corrupt(format!("team id has {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Sled-backed implementation
pub struct SledStorage {
    db: Db,
    teams: Tree,
    team_keys: Tree,
    submissions: Tree,
    limits: Tree,
}

impl SledStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path)?;
        let teams = db.open_tree("teams")?;
        let team_keys = db.open_tree("team_keys")?;
        let submissions = db.open_tree("submissions")?;
        let limits = db.open_tree("limits")?;

        Ok(Self {
            db,
            teams,
            team_keys,
            submissions,
            limits,
        })
    }

    fn decode_submissions<I>(iter: I) -> StorageResult<Vec<Submission>>
    where
        I: Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>,
    {
        let mut submissions = Vec::new();
        for entry in iter {
            let (_, value) = entry?;
            submissions.push(serde_json::from_slice::<Submission>(&value)?);
        }
        Ok(submissions)
    }
}

impl LeaderboardStorage for SledStorage {
    fn create_team(&self, name: &str, key: &str) -> StorageResult<Team> {
        let id = self.db.generate_id()? + 1;

        // Claim the key atomically so two registrations cannot share it.
        let claimed = self.team_keys.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(id.to_be_bytes().to_vec()),
        )?;
        if claimed.is_err() {
            return Err(StorageError::DuplicateTeamKey);
        }

        let stored = StoredTeam {
            id,
            name: name.to_string(),
            key: key.to_string(),
        };
        self.teams
            .insert(id.to_be_bytes(), serde_json::to_vec(&stored)?)?;
        Ok(stored.into())
    }

    fn get_team(&self, id: u64) -> StorageResult<Option<Team>> {
        self.teams
            .get(id.to_be_bytes())?
            .map(|v| serde_json::from_slice::<StoredTeam>(&v).map(Team::from))
            .transpose()
            .map_err(Into::into)
    }

    fn find_team_by_key(&self, key: &str) -> StorageResult<Option<Team>> {
        match self.team_keys.get(key.as_bytes())? {
            Some(id) => self.get_team(decode_id(&id)?),
            None => Ok(None),
        }
    }

    fn list_teams(&self) -> StorageResult<Vec<Team>> {
        let mut teams = Vec::new();
        for entry in self.teams.iter() {
            let (_, v) = entry?;
            teams.push(Team::from(serde_json::from_slice::<StoredTeam>(&v)?));
        }
        Ok(teams)
    }

    fn store_submission(&self, submission: Submission) -> StorageResult<()> {
        if self.teams.get(submission.team_id.to_be_bytes())?.is_none() {
            return Err(StorageError::TeamNotFound(submission.team_id));
        }
        let key = submission_key(submission.team_id, submission.number);
        self.submissions
            .insert(key, serde_json::to_vec(&submission)?)?;
        Ok(())
    }

    fn list_submissions(&self, team_id: u64) -> StorageResult<Vec<Submission>> {
        Self::decode_submissions(self.submissions.scan_prefix(team_id.to_be_bytes()))
    }

    fn count_submissions(&self, team_id: u64) -> StorageResult<u32> {
        let mut count = 0u32;
        for entry in self.submissions.scan_prefix(team_id.to_be_bytes()) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn all_submissions(&self) -> StorageResult<Vec<Submission>> {
        Self::decode_submissions(self.submissions.iter())
    }

    fn get_limit(&self, env: &str) -> StorageResult<Option<u32>> {
        self.limits
            .get(env.as_bytes())?
            .map(|v| serde_json::from_slice(&v))
            .transpose()
            .map_err(Into::into)
    }

    fn set_limit(&self, env: &str, limit: u32) -> StorageResult<()> {
        self.limits
            .insert(env.as_bytes(), serde_json::to_vec(&limit)?)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryInner {
    next_id: u64,
    teams: BTreeMap<u64, Team>,
    keys: HashMap<String, u64>,
    submissions: BTreeMap<(u64, u32), Submission>,
    limits: HashMap<String, u32>,
}

/// In-memory backend for tests and throwaway demos
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaderboardStorage for MemoryStorage {
    fn create_team(&self, name: &str, key: &str) -> StorageResult<Team> {
        let mut inner = self.inner.write();
        if inner.keys.contains_key(key) {
            return Err(StorageError::DuplicateTeamKey);
        }
        inner.next_id += 1;
        let team = Team {
            id: inner.next_id,
            name: name.to_string(),
            key: key.to_string(),
        };
        inner.keys.insert(team.key.clone(), team.id);
        inner.teams.insert(team.id, team.clone());
        Ok(team)
    }

    fn get_team(&self, id: u64) -> StorageResult<Option<Team>> {
        Ok(self.inner.read().teams.get(&id).cloned())
    }

    fn find_team_by_key(&self, key: &str) -> StorageResult<Option<Team>> {
        let inner = self.inner.read();
        Ok(inner
            .keys
            .get(key)
            .and_then(|id| inner.teams.get(id))
            .cloned())
    }

    fn list_teams(&self) -> StorageResult<Vec<Team>> {
        Ok(self.inner.read().teams.values().cloned().collect())
    }

    fn store_submission(&self, submission: Submission) -> StorageResult<()> {
        let mut inner = self.inner.write();
        if !inner.teams.contains_key(&submission.team_id) {
            return Err(StorageError::TeamNotFound(submission.team_id));
        }
        inner
            .submissions
            .insert((submission.team_id, submission.number), submission);
        Ok(())
    }

    fn list_submissions(&self, team_id: u64) -> StorageResult<Vec<Submission>> {
        Ok(self
            .inner
            .read()
            .submissions
            .range((team_id, 0)..=(team_id, u32::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn count_submissions(&self, team_id: u64) -> StorageResult<u32> {
        Ok(self
            .inner
            .read()
            .submissions
            .range((team_id, 0)..=(team_id, u32::MAX))
            .count() as u32)
    }

    fn all_submissions(&self) -> StorageResult<Vec<Submission>> {
        Ok(self.inner.read().submissions.values().cloned().collect())
    }

    fn get_limit(&self, env: &str) -> StorageResult<Option<u32>> {
        Ok(self.inner.read().limits.get(env).copied())
    }

    fn set_limit(&self, env: &str, limit: u32) -> StorageResult<()> {
        self.inner.write().limits.insert(env.to_string(), limit);
        Ok(())
    }
}
