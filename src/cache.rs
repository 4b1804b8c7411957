//! Write-behind score cache
//!
//! The core of the service:
//! - Submissions land in memory and are acknowledged immediately
//! - Reads are served from the ranked in-memory view, never from disk
//! - A background checkpoint task drains the pending buffer into the durable
//!   store in batches, on a fixed interval and at shutdown
//!
//! Key invariants:
//! - `ranked` is always sorted by score descending, timestamp descending
//! - `pending` holds every accepted entry until a checkpoint drains it, so
//!   cap eviction from the ranked view never loses durable data
//! - One mutex guards both collections; the drained batch is written to the
//!   store outside the lock so submits are never blocked on I/O

use crate::config::ScoreboardConfig;
use crate::entry::ScoreEntry;
use crate::storage::ScoreStore;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct CacheInner {
    /// Ranked view, sorted by `ScoreEntry::ranking_order`, capped at
    /// `config.max_entries`
    ranked: Vec<ScoreEntry>,
    /// Accepted entries not yet durably written, in submission order
    pending: Vec<ScoreEntry>,
}

/// In-process ranked score cache with write-behind persistence.
///
/// Constructed once at startup, shared via `Arc` between request handlers
/// and the checkpoint timer task. No global state.
pub struct ScoreCache<S: ScoreStore> {
    inner: Mutex<CacheInner>,
    /// Serializes checkpoint callers: the timer task and the shutdown flush
    /// may overlap, and batches must reach the store in drain order
    checkpoint_lock: Mutex<()>,
    store: S,
    config: ScoreboardConfig,
}

impl<S: ScoreStore> ScoreCache<S> {
    /// Seed the cache from the durable store.
    ///
    /// A store failure here is fatal: the cache must not start serving
    /// without its initial state.
    pub fn new(store: S, config: ScoreboardConfig) -> Result<Self> {
        let mut ranked = store
            .load_all()
            .context("failed to load existing scores from durable store")?;
        if let Some(cap) = config.max_entries {
            ranked.truncate(cap);
        }
        info!("Score cache seeded with {} entries", ranked.len());

        Ok(Self {
            inner: Mutex::new(CacheInner {
                ranked,
                pending: Vec::new(),
            }),
            checkpoint_lock: Mutex::new(()),
            store,
            config,
        })
    }

    /// Accept a score submission.
    ///
    /// Input is assumed already validated by the caller (the HTTP layer
    /// enforces name and score bounds). Never touches the durable store.
    pub fn submit(&self, name: &str, score: u64) {
        let entry = ScoreEntry::new(name, score);

        let mut inner = self.inner.lock();
        inner.pending.push(entry.clone());

        let pos = inner
            .ranked
            .partition_point(|e| ScoreEntry::ranking_order(e, &entry).is_lt());
        inner.ranked.insert(pos, entry);

        if let Some(cap) = self.config.max_entries {
            inner.ranked.truncate(cap);
        }
    }

    /// Read-only snapshot of the top `limit` ranked entries
    pub fn top_n(&self, limit: usize) -> Vec<ScoreEntry> {
        let inner = self.inner.lock();
        let n = limit.min(inner.ranked.len());
        inner.ranked[..n].to_vec()
    }

    /// Number of entries in the ranked view
    pub fn len(&self) -> usize {
        self.inner.lock().ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ranked.is_empty()
    }

    /// Number of entries awaiting durable write
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Drain the pending buffer and persist it as one batch transaction.
    ///
    /// The swap happens under the lock, the store write outside it, so a
    /// concurrent submit lands either in this batch or in the fresh buffer,
    /// never in both. On store failure the batch is dropped after logging;
    /// the ranked view is unaffected and the next checkpoint only sees
    /// entries submitted after the drain point.
    ///
    /// The checkpoint lock is held across the drain and the store write:
    /// overlapping callers (timer tick vs shutdown flush) drain and commit
    /// strictly one after the other, so batches never reach the store out
    /// of submission order. Submits only contend on `inner`.
    ///
    /// Returns the number of entries durably written.
    pub fn checkpoint(&self) -> usize {
        let _serial = self.checkpoint_lock.lock();
        let batch = {
            let mut inner = self.inner.lock();
            std::mem::take(&mut inner.pending)
        };

        if batch.is_empty() {
            debug!("Checkpoint: nothing pending");
            return 0;
        }

        match self.store.insert_batch(&batch) {
            Ok(()) => {
                info!("Checkpoint: persisted {} entries", batch.len());
                batch.len()
            }
            Err(e) => {
                warn!(
                    "Checkpoint failed, dropping batch of {} entries: {e:#}",
                    batch.len()
                );
                0
            }
        }
    }

    /// Final synchronous flush; called by the server lifecycle before exit
    pub fn shutdown(&self) {
        let written = self.checkpoint();
        info!("Score cache shut down ({} entries in final flush)", written);
    }

    pub fn config(&self) -> &ScoreboardConfig {
        &self.config
    }
}

impl<S: ScoreStore + 'static> ScoreCache<S> {
    /// Spawn the recurring checkpoint task.
    ///
    /// The first interval tick fires immediately and is consumed without
    /// flushing, so checkpoints run at `interval, 2*interval, ...`.
    pub fn spawn_checkpoint_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval_secs = self.config.checkpoint_interval_secs;
        let interval = Duration::from_secs(interval_secs);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.checkpoint();
            }
        });

        info!("Checkpoint task started (interval: {}s)", interval_secs);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteScoreStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store double: records batches, fails on demand
    struct FlakyStore {
        written: Mutex<Vec<ScoreEntry>>,
        seed: Vec<ScoreEntry>,
        fail_next: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self::seeded(Vec::new())
        }

        fn seeded(seed: Vec<ScoreEntry>) -> Self {
            Self {
                written: Mutex::new(Vec::new()),
                seed,
                fail_next: AtomicBool::new(false),
            }
        }

        fn written(&self) -> Vec<ScoreEntry> {
            self.written.lock().clone()
        }
    }

    impl ScoreStore for &FlakyStore {
        fn load_all(&self) -> Result<Vec<ScoreEntry>> {
            Ok(self.seed.clone())
        }

        fn insert_batch(&self, entries: &[ScoreEntry]) -> Result<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                anyhow::bail!("simulated storage outage");
            }
            self.written.lock().extend_from_slice(entries);
            Ok(())
        }
    }

    fn names(entries: &[ScoreEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn cache_with(store: &FlakyStore, config: ScoreboardConfig) -> ScoreCache<&FlakyStore> {
        ScoreCache::new(store, config).unwrap()
    }

    #[test]
    fn test_submit_orders_by_score_then_recency() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        // Distinct increasing timestamps: each submit stamps a later instant,
        // and equal-score ties rank the most recent first
        cache.submit("Alice", 50);
        std::thread::sleep(Duration::from_millis(2));
        cache.submit("Bob", 70);
        std::thread::sleep(Duration::from_millis(2));
        cache.submit("Carol", 70);

        let top = cache.top_n(3);
        assert_eq!(names(&top), vec!["Carol", "Bob", "Alice"]);
    }

    #[test]
    fn test_seed_from_store() {
        let store = FlakyStore::seeded(vec![ScoreEntry {
            name: "X".to_string(),
            score: 10,
            timestamp: 100,
        }]);
        let cache = cache_with(&store, ScoreboardConfig::default());

        let top = cache.top_n(5);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "X");
        assert_eq!(top[0].score, 10);
        assert_eq!(top[0].timestamp, 100);
        assert_eq!(cache.pending_len(), 0);
    }

    #[test]
    fn test_top_n_is_prefix_and_idempotent() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        for (name, score) in [("a", 5), ("b", 30), ("c", 20), ("d", 40)] {
            cache.submit(name, score);
        }

        let all = cache.top_n(usize::MAX);
        let two = cache.top_n(2);
        assert_eq!(two, all[..2].to_vec());

        // No intervening submit: identical results
        assert_eq!(cache.top_n(2), two);

        // Clamped to the ranked length
        assert_eq!(cache.top_n(100).len(), 4);
        assert!(cache.top_n(0).is_empty());
    }

    #[test]
    fn test_checkpoint_drains_pending_in_submission_order() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        cache.submit("low", 1);
        cache.submit("high", 99);
        cache.submit("mid", 50);
        assert_eq!(cache.pending_len(), 3);

        let written = cache.checkpoint();
        assert_eq!(written, 3);
        assert_eq!(cache.pending_len(), 0);

        // Batch order is submission order, not rank order
        assert_eq!(names(&store.written()), vec!["low", "high", "mid"]);
    }

    #[test]
    fn test_checkpoint_empty_is_noop() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        assert_eq!(cache.checkpoint(), 0);
        assert!(store.written().is_empty());
    }

    #[test]
    fn test_checkpoint_failure_drops_batch_keeps_ranked() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        cache.submit("a", 10);
        cache.submit("b", 20);
        cache.submit("c", 30);

        store.fail_next.store(true, Ordering::SeqCst);
        assert_eq!(cache.checkpoint(), 0);

        // Batch discarded, reads unaffected
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.len(), 3);
        assert!(store.written().is_empty());

        // Next checkpoint flushes only newer entries
        cache.submit("d", 40);
        assert_eq!(cache.checkpoint(), 1);
        assert_eq!(names(&store.written()), vec!["d"]);
    }

    #[test]
    fn test_cap_keeps_highest() {
        let store = FlakyStore::new();
        let config = ScoreboardConfig {
            max_entries: Some(2),
            ..Default::default()
        };
        let cache = cache_with(&store, config);

        cache.submit("a", 10);
        cache.submit("b", 20);
        cache.submit("c", 30);

        assert_eq!(cache.len(), 2);
        let top = cache.top_n(10);
        assert_eq!(names(&top), vec!["c", "b"]);
    }

    #[test]
    fn test_cap_applied_to_seed() {
        let seed = (0..5)
            .map(|i| ScoreEntry {
                name: format!("p{i}"),
                score: 100 - i as u64,
                timestamp: i,
            })
            .collect();
        let store = FlakyStore::seeded(seed);
        let config = ScoreboardConfig {
            max_entries: Some(3),
            ..Default::default()
        };
        let cache = cache_with(&store, config);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.top_n(10)[0].score, 100);
    }

    #[test]
    fn test_evicted_entry_is_still_flushed() {
        let store = FlakyStore::new();
        let config = ScoreboardConfig {
            max_entries: Some(1),
            ..Default::default()
        };
        let cache = cache_with(&store, config);

        cache.submit("loser", 1);
        cache.submit("winner", 100);

        // "loser" fell out of the ranked view but stays pending
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.pending_len(), 2);

        assert_eq!(cache.checkpoint(), 2);
        assert_eq!(names(&store.written()), vec!["loser", "winner"]);
    }

    /// Store double whose first write stalls on a barrier, letting a test
    /// race a second checkpoint against an in-flight one
    struct StallingStore {
        written: Mutex<Vec<ScoreEntry>>,
        gate: std::sync::Barrier,
        stall_next: AtomicBool,
    }

    impl StallingStore {
        fn new() -> Self {
            Self {
                written: Mutex::new(Vec::new()),
                gate: std::sync::Barrier::new(2),
                stall_next: AtomicBool::new(true),
            }
        }

        fn written(&self) -> Vec<ScoreEntry> {
            self.written.lock().clone()
        }
    }

    impl ScoreStore for &StallingStore {
        fn load_all(&self) -> Result<Vec<ScoreEntry>> {
            Ok(Vec::new())
        }

        fn insert_batch(&self, entries: &[ScoreEntry]) -> Result<()> {
            if self.stall_next.swap(false, Ordering::SeqCst) {
                self.gate.wait(); // write started
                self.gate.wait(); // hold until the test releases it
            }
            self.written.lock().extend_from_slice(entries);
            Ok(())
        }
    }

    #[test]
    fn test_overlapping_checkpoints_commit_in_drain_order() {
        let store = StallingStore::new();
        let cache = ScoreCache::new(&store, ScoreboardConfig::default()).unwrap();

        cache.submit("first", 1);

        std::thread::scope(|s| {
            let stalled = s.spawn(|| cache.checkpoint());

            // First batch is drained and its store write is in flight
            store.gate.wait();

            cache.submit("second", 2);
            let racing = s.spawn(|| cache.checkpoint());

            // The racing caller must queue behind the in-flight checkpoint,
            // not commit its newer batch first
            std::thread::sleep(Duration::from_millis(50));
            assert!(store.written().is_empty());

            store.gate.wait();
            assert_eq!(stalled.join().unwrap(), 1);
            assert_eq!(racing.join().unwrap(), 1);
        });

        assert_eq!(names(&store.written()), vec!["first", "second"]);
    }

    #[test]
    fn test_shutdown_flushes_pending() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        cache.submit("a", 1);
        cache.shutdown();

        assert_eq!(cache.pending_len(), 0);
        assert_eq!(store.written().len(), 1);
    }

    #[test]
    fn test_sort_invariant_under_mixed_submits() {
        let store = FlakyStore::new();
        let cache = cache_with(&store, ScoreboardConfig::default());

        for score in [7u64, 3, 9, 9, 1, 5, 9, 0, 7] {
            cache.submit("p", score);
            let snapshot = cache.top_n(usize::MAX);
            for pair in snapshot.windows(2) {
                assert!(ScoreEntry::ranking_order(&pair[0], &pair[1]).is_le());
            }
        }
    }

    #[test]
    fn test_against_sqlite_store_round_trip() {
        let store = SqliteScoreStore::in_memory().unwrap();
        let cache = ScoreCache::new(store, ScoreboardConfig::default()).unwrap();

        cache.submit("alice", 50);
        cache.submit("bob", 70);
        assert_eq!(cache.checkpoint(), 2);

        // A fresh cache over the same store sees the flushed entries
        // (SqliteScoreStore::in_memory is per-connection, so reuse the cache's
        // own store through a second load path: submit more and re-flush)
        cache.submit("carol", 90);
        cache.shutdown();
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_checkpoint_task_flushes_on_interval() {
        let store = FlakyStore::seeded(Vec::new());
        // 'static store required for the spawned task
        let store: &'static FlakyStore = Box::leak(Box::new(store));
        let config = ScoreboardConfig {
            checkpoint_interval_secs: 1,
            ..Default::default()
        };
        let cache = Arc::new(ScoreCache::new(store, config).unwrap());

        cache.submit("a", 10);
        let handle = Arc::clone(&cache).spawn_checkpoint_task();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(store.written().len(), 1);

        handle.abort();
    }
}
