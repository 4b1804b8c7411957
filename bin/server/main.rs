//! Scoreboard Server
//!
//! Runs the leaderboard service as a standalone HTTP server.

use anyhow::Result;
use clap::Parser;
use scoreboard::{run_server, ScoreCache, ScoreboardConfig, SqliteScoreStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "scoreboard-server")]
#[command(about = "Write-behind leaderboard HTTP server")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "8080", env = "SCOREBOARD_PORT")]
    port: u16,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "SCOREBOARD_HOST")]
    host: String,

    /// SQLite database path
    #[arg(short, long, default_value = "data/scores.db", env = "SCOREBOARD_DB")]
    db_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scoreboard=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = ScoreboardConfig::from_env();

    info!("Starting Scoreboard Server");
    info!("  Database: {:?}", args.db_path);
    info!("  Checkpoint interval: {}s", config.checkpoint_interval_secs);
    info!("  In-memory cap: {:?}", config.max_entries);
    info!("  Listening on: {}:{}", args.host, args.port);

    // Startup is fatal if the store cannot open or the seed load fails
    let store = SqliteScoreStore::open(args.db_path)?;
    let cache = Arc::new(ScoreCache::new(store, config)?);

    let checkpoint_task = Arc::clone(&cache).spawn_checkpoint_task();

    // run_server performs the final flush after graceful shutdown
    run_server(Arc::clone(&cache), &args.host, args.port).await?;

    checkpoint_task.abort();
    info!("Scoreboard server stopped");
    Ok(())
}
