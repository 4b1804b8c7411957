//! Score entry value type and ranking order

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single accepted score submission.
///
/// Immutable after creation: the cache builds one at submission time and
/// every collection that holds it (ranked view, pending buffer, durable
/// table) sees the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: u64,
    /// Wall-clock epoch milliseconds assigned when the entry was accepted
    pub timestamp: i64,
}

impl ScoreEntry {
    /// Create an entry stamped with the current wall clock
    pub fn new(name: impl Into<String>, score: u64) -> Self {
        Self {
            name: name.into(),
            score,
            timestamp: now_millis(),
        }
    }

    /// Total ranking order: score descending, ties broken by timestamp
    /// descending (most recent first)
    pub fn ranking_order(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
        b.score
            .cmp(&a.score)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    }
}

/// Current wall clock as epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
