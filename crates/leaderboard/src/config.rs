//! Service configuration
//!
//! Values come from an optional TOML file overlaid with `HACKBOARD_*`
//! environment variables. Anything unset falls back to [`AppConfig::default`].

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use hackboard_grader::{Averaging, GraderConfig, DEFAULT_LABEL_COLUMN};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// File picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "hackboard.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Sled database directory
    pub data_dir: PathBuf,
    /// Keep everything in memory instead of sled
    pub in_memory: bool,
    /// CSV file holding the ground truth labels
    pub reference_path: PathBuf,
    pub label_column: String,
    pub averaging: Averaging,
    /// Selects which stored submission limit applies
    pub environment: String,
    /// Used when no limit is stored for `environment`
    pub default_limit: u32,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("./data/hackboard"),
            in_memory: false,
            reference_path: PathBuf::from("./y_true.csv"),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            averaging: Averaging::Macro,
            environment: "production".to_string(),
            default_limit: 5,
            max_upload_bytes: 10 * 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}

/// `HACKBOARD_*` variables, e.g. `HACKBOARD_DEFAULT_LIMIT=10`
fn env_source() -> Environment {
    Environment::with_prefix("HACKBOARD").try_parsing(true)
}

impl AppConfig {
    /// Load configuration. An explicit path must exist; the default file is
    /// optional.
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        Self::load_with_env(config_path_override, env_source())
    }

    fn load_with_env(config_path_override: Option<&Path>, env: Environment) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(env);

        let config: AppConfig = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.label_column.trim().is_empty() {
            bail!("label_column must not be empty");
        }
        if self.environment.trim().is_empty() {
            bail!("environment must not be empty");
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be positive");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("invalid bind_addr '{}'", self.bind_addr))
    }

    pub fn grader_config(&self) -> GraderConfig {
        GraderConfig {
            label_column: self.label_column.clone(),
            averaging: self.averaging,
        }
    }
}
