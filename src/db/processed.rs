use sqlx::SqlitePool;

use crate::db::models::ProcessedRow;

/// Journal of dedup keys that passed the deduplicator, so the in-memory
/// window can be rebuilt after a restart.
#[derive(Clone)]
pub struct ProcessedJournal {
    pool: SqlitePool,
}

impl ProcessedJournal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a key. Re-recording an existing key keeps the original timestamp.
    pub async fn record(&self, dedup_key: &str, seen_at: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO processed_transactions (dedup_key, first_seen_at) VALUES (?, ?)")
            .bind(dedup_key)
            .bind(seen_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Keys first seen at or after `cutoff` (unix seconds).
    pub async fn load_since(&self, cutoff: i64) -> Result<Vec<ProcessedRow>, sqlx::Error> {
        sqlx::query_as::<_, ProcessedRow>(
            "SELECT dedup_key, first_seen_at FROM processed_transactions WHERE first_seen_at >= ?",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
    }

    /// Delete keys first seen before `cutoff`. Returns rows removed.
    pub async fn prune_before(&self, cutoff: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM processed_transactions WHERE first_seen_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn record_is_idempotent_and_prunable() {
        let journal = ProcessedJournal::new(memory_pool().await);
        journal.record("tx1:wallet", 1_000).await.unwrap();
        journal.record("tx1:wallet", 5_000).await.unwrap();
        journal.record("tx2:wallet", 2_000).await.unwrap();

        let recent = journal.load_since(1_500).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].dedup_key, "tx2:wallet");

        assert_eq!(journal.prune_before(1_500).await.unwrap(), 1);
        assert_eq!(journal.load_since(0).await.unwrap().len(), 1);
    }
}
