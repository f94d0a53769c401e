use hackboard_grader::GradeError;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Team key already registered")]
    DuplicateTeamKey,
    #[error("Team {0} not found")]
    TeamNotFound(u64),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Reasons a submission is refused
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Team Key not found")]
    UnknownTeam,
    #[error("Submission count exceeded ({limit} allowed). You trying to overfit???")]
    LimitExceeded { limit: u32 },
    #[error("Submission is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("{0}")]
    Grade(#[from] GradeError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SubmitError {
    /// Short label used for metrics and logs
    pub fn outcome(&self) -> &'static str {
        match self {
            SubmitError::UnknownTeam => "unknown_team",
            SubmitError::LimitExceeded { .. } => "limit_exceeded",
            SubmitError::Encoding(_) => "invalid_encoding",
            SubmitError::Grade(err) if err.is_submission_error() => "invalid_submission",
            SubmitError::Grade(_) => "grader_error",
            SubmitError::Storage(_) => "storage_error",
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
