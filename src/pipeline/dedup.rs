//! Recency store for processed (transaction, address) keys.
//! Checked and marked by the pipeline, purged by DedupSweeper.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::DEDUP_SWEEP_INTERVAL_SECS;
use crate::db::ProcessedJournal;

/// `signature:address`. One transaction fans out to every watched address
/// it touches, and each pair is delivered at most once.
pub fn dedup_key(signature: &str, address: &str) -> String {
    format!("{signature}:{address}")
}

pub struct Deduplicator {
    seen: DashMap<String, Instant>,
    retention: Duration,
    capacity: usize,
}

impl Deduplicator {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            seen: DashMap::new(),
            retention,
            capacity: capacity.max(1),
        }
    }

    /// Atomically check and mark. Returns true on the first sighting of
    /// `key` (the caller owns delivery), false for a duplicate. A key whose
    /// mark has expired counts as a first sighting again.
    pub fn check_and_mark(&self, key: &str) -> bool {
        self.check_and_mark_at(key, Instant::now())
    }

    pub fn check_and_mark_at(&self, key: &str, now: Instant) -> bool {
        let fresh = match self.seen.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.retention {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };
        // The shard guard is released above; purging takes other shard locks.
        if fresh && self.seen.len() > self.capacity {
            self.enforce_capacity(now);
        }
        fresh
    }

    /// True if `key` is marked and unexpired.
    pub fn seen(&self, key: &str) -> bool {
        self.seen
            .get(key)
            .map_or(false, |at| at.elapsed() < self.retention)
    }

    pub fn mark_seen(&self, key: &str) {
        self.seen.insert(key.to_string(), Instant::now());
    }

    /// Drop a mark, e.g. when it could not be journaled.
    pub fn forget(&self, key: &str) {
        self.seen.remove(key);
    }

    /// Re-insert a journaled key with its original first-seen time (unix secs).
    /// Keys already past retention are skipped.
    pub fn restore(&self, key: &str, first_seen_unix: i64) -> bool {
        let age = Duration::from_secs(now_secs().saturating_sub(first_seen_unix).max(0) as u64);
        if age >= self.retention {
            return false;
        }
        let at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
        self.seen.insert(key.to_string(), at);
        true
    }

    /// Remove every expired mark. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.seen.len();
        self.seen
            .retain(|_, at| now.saturating_duration_since(*at) < self.retention);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn enforce_capacity(&self, now: Instant) {
        let purged = self.purge_expired(now);
        let excess = self.seen.len().saturating_sub(self.capacity);
        if excess == 0 {
            debug!(purged, "[DEDUP] capacity restored by purge");
            return;
        }

        let mut by_age: Vec<(String, Instant)> = self
            .seen
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);
        for (key, _) in by_age.into_iter().take(excess) {
            self.seen.remove(&key);
        }
        warn!(purged, evicted = excess, "[DEDUP] capacity reached, evicted oldest keys");
    }
}

/// Periodically purges expired marks from memory and the journal.
pub struct DedupSweeper {
    dedup: Arc<Deduplicator>,
    journal: ProcessedJournal,
}

impl DedupSweeper {
    pub fn new(dedup: Arc<Deduplicator>, journal: ProcessedJournal) -> Self {
        Self { dedup, journal }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(DEDUP_SWEEP_INTERVAL_SECS));
        ticker.tick().await; // first tick fires immediately; nothing has expired yet

        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    async fn sweep(&self) {
        let purged = self.dedup.purge_expired(Instant::now());
        let cutoff = now_secs() - self.dedup.retention().as_secs() as i64;
        match self.journal.prune_before(cutoff).await {
            Ok(pruned) => {
                if purged > 0 || pruned > 0 {
                    info!(purged, pruned, remaining = self.dedup.len(), "[DEDUP] sweep");
                }
            }
            Err(e) => warn!("[DEDUP] journal prune failed: {e}"),
        }
    }
}

/// Warm the in-memory store from the journal. Returns how many keys were restored.
pub async fn warm_from_journal(
    dedup: &Deduplicator,
    journal: &ProcessedJournal,
) -> Result<usize, sqlx::Error> {
    let cutoff = now_secs() - dedup.retention().as_secs() as i64;
    let rows = journal.load_since(cutoff).await?;
    Ok(rows
        .iter()
        .filter(|row| dedup.restore(&row.dedup_key, row.first_seen_at))
        .count())
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
