//! Touchline Sync - background daemon keeping the local football data store
//! fresh.
//!
//! Wires the upstream client, the volatile cache, the SQLite stores and the
//! sync scheduler together, then runs until Ctrl-C.

mod daemon;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use touchline::{EntityType, PathsConfig, SchedulerDefaults, UpstreamConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "touchline-sync")]
#[command(about = "Keeps a local football data store fresh within the upstream quota")]
pub struct Args {
    /// football-data.org API key
    #[arg(long, env = "FOOTBALL_DATA_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Upstream base URL
    #[arg(long, env = "FOOTBALL_DATA_BASE_URL", default_value = UpstreamConfig::BASE_URL)]
    pub base_url: String,

    /// Competition codes to track (comma separated); discovered via the API if empty
    #[arg(long, env = "TOUCHLINE_COMPETITIONS", value_delimiter = ',')]
    pub competitions: Vec<String>,

    /// Team ids to track (comma separated)
    #[arg(long, env = "TOUCHLINE_TEAMS", value_delimiter = ',')]
    pub teams: Vec<u64>,

    /// Volatile cache backend: memory or redis
    #[arg(long, env = "TOUCHLINE_CACHE_BACKEND", default_value = "memory")]
    pub cache_backend: String,

    /// Networked cache URL (for the redis backend)
    #[arg(long, env = "TOUCHLINE_CACHE_URL")]
    pub cache_url: Option<String>,

    /// In-process cache capacity
    #[arg(long, env = "TOUCHLINE_CACHE_CAPACITY")]
    pub cache_capacity: Option<usize>,

    /// Upstream requests allowed per minute
    #[arg(long, env = "TOUCHLINE_REQUESTS_PER_MINUTE", default_value_t = UpstreamConfig::REQUESTS_PER_WINDOW)]
    pub requests_per_minute: u32,

    /// Seconds between sync ticks
    #[arg(long, env = "TOUCHLINE_SYNC_INTERVAL", default_value_t = SchedulerDefaults::SYNC_INTERVAL.as_secs())]
    pub sync_interval_secs: u64,

    /// Milliseconds to wait between upstream-touching entities
    #[arg(long, default_value_t = SchedulerDefaults::INTER_ENTITY_DELAY.as_millis() as u64)]
    pub inter_entity_delay_ms: u64,

    /// TTL override, e.g. `matches=60` (seconds); may be repeated
    #[arg(long = "ttl", value_parser = parse_ttl)]
    pub ttl_overrides: Vec<(EntityType, Duration)>,

    /// SQLite database path (defaults to the user data directory)
    #[arg(long, env = "TOUCHLINE_DATABASE")]
    pub database: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Args {
    fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(PathsConfig::DATA_DIR_NAME)
                .join(PathsConfig::DATABASE_FILENAME)
        })
    }
}

fn parse_ttl(value: &str) -> std::result::Result<(EntityType, Duration), String> {
    let (kind, secs) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=SECONDS, got '{}'", value))?;
    let entity_type = kind.parse::<EntityType>().map_err(|e| e.to_string())?;
    let secs: u64 = secs
        .trim()
        .parse()
        .map_err(|e| format!("invalid seconds '{}': {}", secs, e))?;
    Ok((entity_type, Duration::from_secs(secs)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Touchline sync daemon");

    let database = args.database_path();
    info!("Database: {}", database.display());

    daemon::run(args, database).await
}
