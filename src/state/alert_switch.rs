use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::db::SettingsRepository;

/// Master on/off switch for outbound alerts, persisted in `settings`.
pub struct AlertSwitch {
    enabled: AtomicBool,
    repo: SettingsRepository,
}

impl AlertSwitch {
    pub async fn load(repo: SettingsRepository) -> Result<Self, sqlx::Error> {
        let enabled = repo.alerts_enabled().await?;
        Ok(Self {
            enabled: AtomicBool::new(enabled),
            repo,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Persist first; the in-memory flag only changes once the write commits.
    pub async fn set(&self, enabled: bool) -> Result<(), sqlx::Error> {
        self.repo.set_alerts_enabled(enabled).await?;
        self.enabled.store(enabled, Ordering::Release);
        info!(enabled, "Alerts switched {}", if enabled { "on" } else { "off" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn switch_state_is_reloaded_from_storage() {
        let pool = memory_pool().await;
        let switch = AlertSwitch::load(SettingsRepository::new(pool.clone())).await.unwrap();
        assert!(switch.is_enabled());

        switch.set(false).await.unwrap();
        assert!(!switch.is_enabled());

        let reloaded = AlertSwitch::load(SettingsRepository::new(pool)).await.unwrap();
        assert!(!reloaded.is_enabled());
    }
}
