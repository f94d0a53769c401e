//! Hackboard leaderboard
//!
//! Team registry, per-environment submission limits, persistence and the
//! HTTP views around the submission grader.

pub mod config;
pub mod errors;
pub mod html;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;

use anyhow::{Context, Result};
use hackboard_grader::Grader;
use std::sync::Arc;
use tracing::info;

pub use config::AppConfig;
pub use errors::{StorageError, SubmitError};
pub use server::{build_router, start_server, AppState};
pub use service::LeaderboardService;
pub use storage::{LeaderboardStorage, MemoryStorage, SledStorage};
pub use types::{LeaderboardEntry, Submission, Team, TeamHistory};

/// Open the storage backend selected by the configuration.
pub fn open_storage(config: &AppConfig) -> Result<Arc<dyn LeaderboardStorage>> {
    if config.in_memory {
        info!("Using in-memory storage");
        return Ok(Arc::new(MemoryStorage::new()));
    }
    info!("Opening sled storage at {}", config.data_dir.display());
    let storage = SledStorage::open(&config.data_dir)
        .with_context(|| format!("failed to open storage at {}", config.data_dir.display()))?;
    Ok(Arc::new(storage))
}

/// Load the reference labels and build the grader.
pub fn load_grader(config: &AppConfig) -> Result<Grader> {
    let grader = Grader::from_csv(&config.reference_path, config.grader_config()).with_context(
        || {
            format!(
                "failed to load reference labels from {}",
                config.reference_path.display()
            )
        },
    )?;
    info!(
        rows = grader.expected_rows(),
        classes = grader.table().len(),
        averaging = %config.averaging,
        "Loaded reference labels"
    );
    Ok(grader)
}

/// Build the service from configuration.
pub fn build_service(config: &AppConfig) -> Result<LeaderboardService> {
    let grader = load_grader(config)?;
    let storage = open_storage(config)?;
    Ok(LeaderboardService::new(
        storage,
        Arc::new(grader),
        config.environment.clone(),
        config.default_limit,
    ))
}
