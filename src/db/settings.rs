use sqlx::SqlitePool;

const ALERTS_ENABLED_KEY: &str = "alerts_enabled";

/// Key/value service settings.
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Alerts default to enabled when the setting has never been written.
    pub async fn alerts_enabled(&self) -> Result<bool, sqlx::Error> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(ALERTS_ENABLED_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.map_or(true, |v| v == "1"))
    }

    pub async fn set_alerts_enabled(&self, enabled: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(ALERTS_ENABLED_KEY)
        .bind(if enabled { "1" } else { "0" })
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn alerts_default_on_and_toggle_persists() {
        let repo = SettingsRepository::new(memory_pool().await);
        assert!(repo.alerts_enabled().await.unwrap());

        repo.set_alerts_enabled(false).await.unwrap();
        assert!(!repo.alerts_enabled().await.unwrap());

        repo.set_alerts_enabled(true).await.unwrap();
        assert!(repo.alerts_enabled().await.unwrap());
    }
}
