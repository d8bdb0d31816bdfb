/// Database row types matching `migrations/0001_init.sql`.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WhaleRow {
    pub id: i64,
    pub address: String,
    pub label: String,
    pub active: bool,
    pub added_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessedRow {
    pub dedup_key: String,
    pub first_seen_at: i64,
}

impl From<WhaleRow> for crate::types::WatchedAddress {
    fn from(row: WhaleRow) -> Self {
        Self {
            id: row.id,
            address: row.address,
            label: row.label,
            status: if row.active {
                crate::types::WatchStatus::Active
            } else {
                crate::types::WatchStatus::Paused
            },
            added_at: row.added_at,
        }
    }
}
