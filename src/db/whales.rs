use sqlx::SqlitePool;

use crate::db::models::WhaleRow;

/// SQL access for the `whales` table. Every method commits before returning,
/// so a successful return means the change survives a restart.
#[derive(Clone)]
pub struct WhaleRepository {
    pool: SqlitePool,
}

impl WhaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All rows in insertion order.
    pub async fn fetch_all(&self) -> Result<Vec<WhaleRow>, sqlx::Error> {
        sqlx::query_as::<_, WhaleRow>(
            "SELECT id, address, label, active, added_at FROM whales ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Insert an active row and return its id.
    pub async fn insert(&self, label: &str, address: &str, added_at: i64) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO whales (address, label, label_key, active, added_at)
            VALUES (?, ?, ?, 1, ?)
            "#,
        )
        .bind(address)
        .bind(label)
        .bind(label.to_lowercase())
        .bind(added_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM whales WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE whales SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Bulk status change. Returns the number of rows touched.
    pub async fn set_all_active(&self, active: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE whales SET active = ?")
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
