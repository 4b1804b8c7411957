//! Scoreboard: a write-behind leaderboard service
//!
//! Clients submit name/score pairs and read the current top entries. The core
//! is the score cache: writes land in memory and are acknowledged
//! immediately, reads are served from the ranked in-memory view, and a
//! background checkpoint task persists accepted entries to SQLite in batches
//! on a fixed interval and at shutdown.
//!
//! ## Module Structure
//!
//! - `entry`: the `ScoreEntry` value type and its ranking order
//! - `config`: service configuration with env overrides
//! - `storage`: the durable append-only score table (SQLite)
//! - `cache`: the ranked cache, pending buffer, and checkpoint logic
//! - `server`: axum HTTP layer with request validation

/// Score entry value type
pub mod entry;

/// Service configuration
pub mod config;

/// Durable score storage
pub mod storage;

/// Write-behind score cache
pub mod cache;

/// HTTP server
pub mod server;

pub use cache::ScoreCache;
pub use config::ScoreboardConfig;
pub use entry::ScoreEntry;
pub use server::{build_router, run_server, ServerState};
pub use storage::{ScoreStore, SqliteScoreStore};
