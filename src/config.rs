//! Scoreboard configuration
//!
//! Defaults match the service's intended footprint:
//! - 10 second checkpoint interval
//! - 1000 entry in-memory cap
//! - 10 entry default leaderboard page

/// Default checkpoint interval in seconds
pub const DEFAULT_CHECKPOINT_INTERVAL_SECS: u64 = 10;

/// Default maximum number of ranked entries kept in memory
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default page size for leaderboard reads
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default maximum display-name length accepted by the API
pub const DEFAULT_MAX_NAME_LEN: usize = 32;

/// Default maximum score accepted by the API
pub const DEFAULT_MAX_SCORE: u64 = 1_000_000_000;

/// Configuration for the score cache and its HTTP surface
#[derive(Debug, Clone)]
pub struct ScoreboardConfig {
    /// Seconds between background checkpoints
    pub checkpoint_interval_secs: u64,
    /// In-memory cap on the ranked view; `None` keeps every entry
    pub max_entries: Option<usize>,
    /// Leaderboard page size when the request omits `limit`
    pub default_page_size: usize,
    /// Maximum accepted display-name length
    pub max_name_len: usize,
    /// Maximum accepted score value
    pub max_score: u64,
}

impl Default for ScoreboardConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_secs: DEFAULT_CHECKPOINT_INTERVAL_SECS,
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_score: DEFAULT_MAX_SCORE,
        }
    }
}

impl ScoreboardConfig {
    /// Build a config from environment variables, falling back to defaults.
    /// `SCOREBOARD_MAX_ENTRIES=0` disables the cap.
    pub fn from_env() -> Self {
        let max_entries = std::env::var("SCOREBOARD_MAX_ENTRIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|n| if n == 0 { None } else { Some(n) })
            .unwrap_or(Some(DEFAULT_MAX_ENTRIES));

        Self {
            checkpoint_interval_secs: std::env::var("SCOREBOARD_CHECKPOINT_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CHECKPOINT_INTERVAL_SECS),
            max_entries,
            default_page_size: std::env::var("SCOREBOARD_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            max_name_len: std::env::var("SCOREBOARD_MAX_NAME_LEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_NAME_LEN),
            max_score: std::env::var("SCOREBOARD_MAX_SCORE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_SCORE),
        }
    }
}
