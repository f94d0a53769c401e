//! Hackboard CLI
//!
//! Runs the leaderboard server and the offline admin commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hackboard_grader::LabelTable;
use hackboard_leaderboard::service::register_team;
use hackboard_leaderboard::{
    build_service, load_grader, open_storage, start_server, AppConfig, AppState,
};
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hackboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hackathon submission grader and leaderboard", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP leaderboard
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Grade a CSV file against the reference labels and print the score
    Grade {
        /// Submission CSV path
        path: PathBuf,
    },
    /// Manage teams
    Team {
        #[command(subcommand)]
        command: TeamCommand,
    },
    /// Manage submission limits
    Limit {
        #[command(subcommand)]
        command: LimitCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TeamCommand {
    /// Register a team and print its key
    Add {
        name: String,
        /// Use this key instead of generating one
        #[arg(long)]
        key: Option<String>,
    },
    /// List registered teams
    List,
}

#[derive(Subcommand, Debug)]
enum LimitCommand {
    /// Set the submission limit
    Set {
        limit: u32,
        /// Environment name (defaults to the configured one)
        #[arg(long)]
        env: Option<String>,
    },
    /// Show the active submission limit
    Show {
        #[arg(long)]
        env: Option<String>,
    },
}

fn init_tracing(level: &str, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .context("Failed to set tracing subscriber")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.log_level, cli.verbose)?;

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
                config.validate()?;
            }
            serve(config).await
        }
        Command::Grade { path } => grade(&config, &path),
        Command::Team { command } => team(&config, command),
        Command::Limit { command } => limit(&config, command),
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Hackboard v{}", env!("CARGO_PKG_VERSION"));
    let service = Arc::new(build_service(&config)?);

    let mut state = AppState::new(service, config.max_upload_bytes);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            describe_counter!(
                "hackboard_submissions_total",
                "Submission attempts by outcome"
            );
            state = state.with_metrics(handle);
        }
        Err(err) => warn!("Prometheus exporter disabled: {}", err),
    }

    let limit = state.service.limit()?;
    info!(env = %config.environment, limit, "Accepting submissions");
    start_server(state, &config.bind_addr).await
}

fn grade(config: &AppConfig, path: &Path) -> Result<()> {
    let grader = load_grader(config)?;
    let table = LabelTable::from_path(path)
        .with_context(|| format!("failed to read submission {}", path.display()))?;
    let score = grader.grade(&table)?;
    println!("{score:.6}");
    Ok(())
}

fn team(config: &AppConfig, command: TeamCommand) -> Result<()> {
    let storage = open_storage(config)?;
    match command {
        TeamCommand::Add { name, key } => {
            let team = register_team(storage.as_ref(), &name, key.as_deref())
                .context("failed to register team")?;
            println!("{}\t{}\t{}", team.id, team.name, team.key);
        }
        TeamCommand::List => {
            for team in storage.list_teams()? {
                let submissions = storage.count_submissions(team.id)?;
                println!("{}\t{}\t{} submission(s)", team.id, team.name, submissions);
            }
        }
    }
    storage.flush()?;
    Ok(())
}

fn limit(config: &AppConfig, command: LimitCommand) -> Result<()> {
    let storage = open_storage(config)?;
    match command {
        LimitCommand::Set { limit, env } => {
            let env = env.unwrap_or_else(|| config.environment.clone());
            storage.set_limit(&env, limit)?;
            println!("{env}: {limit}");
        }
        LimitCommand::Show { env } => {
            let env = env.unwrap_or_else(|| config.environment.clone());
            let limit = storage.get_limit(&env)?.unwrap_or(config.default_limit);
            println!("{env}: {limit}");
        }
    }
    storage.flush()?;
    Ok(())
}
