use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::db::WhaleRepository;
use crate::types::{WatchStatus, WatchedAddress};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Address {0} is already tracked")]
    DuplicateAddress(String),

    #[error("Label {0} is already in use")]
    DuplicateLabel(String),

    #[error("No tracked wallet matches {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Persistence(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// WatchList: insertion-ordered snapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the registry in insertion order. Iterating it does
/// not consume it, so callers can walk it as often as they like.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    entries: Vec<WatchedAddress>,
}

impl WatchList {
    pub fn iter(&self) -> std::slice::Iter<'_, WatchedAddress> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active()).count()
    }

    pub fn into_vec(self) -> Vec<WatchedAddress> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a WatchList {
    type Item = &'a WatchedAddress;
    type IntoIter = std::slice::Iter<'a, WatchedAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The single owner of the watched-wallet list.
///
/// Reads (the pipeline's hot path) go to the in-memory maps and never touch
/// SQLite. Mutations are serialised by `write_lock`, committed to SQLite first
/// and only then applied to the maps, so a reader never observes a change that
/// is not durable, and every read after a successful return observes it.
pub struct Registry {
    repo: WhaleRepository,
    /// address → entry
    by_address: DashMap<String, WatchedAddress>,
    /// lowercased label → address
    by_label: DashMap<String, String>,
    write_lock: Mutex<()>,
}

impl Registry {
    /// Hydrate the registry from the database.
    pub async fn load(repo: WhaleRepository) -> Result<Arc<Self>, RegistryError> {
        let rows = repo.fetch_all().await?;
        let registry = Self {
            repo,
            by_address: DashMap::new(),
            by_label: DashMap::new(),
            write_lock: Mutex::new(()),
        };
        for row in rows {
            registry.cache_insert(row.into());
        }
        info!(
            total = registry.by_address.len(),
            "Watch list loaded: {} wallets",
            registry.by_address.len()
        );
        Ok(Arc::new(registry))
    }

    /// Insert seed entries that are not present yet. Entries colliding on
    /// address or label are skipped. Returns how many were added.
    pub async fn seed(&self, entries: &[(String, String)]) -> Result<usize, RegistryError> {
        let mut added = 0;
        for (label, address) in entries {
            match self.add(label, address).await {
                Ok(_) => added += 1,
                Err(RegistryError::DuplicateAddress(_)) | Err(RegistryError::DuplicateLabel(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if added > 0 {
            info!("Seeded {added} wallets into the watch list");
        }
        Ok(added)
    }

    /// Track a new wallet as active.
    pub async fn add(&self, label: &str, address: &str) -> Result<WatchedAddress, RegistryError> {
        let _guard = self.write_lock.lock().await;

        if self.by_address.contains_key(address) {
            return Err(RegistryError::DuplicateAddress(address.to_string()));
        }
        if self.by_label.contains_key(&label_key(label)) {
            return Err(RegistryError::DuplicateLabel(label.to_string()));
        }

        let added_at = now_secs();
        let id = self.repo.insert(label, address, added_at).await?;
        let entry = WatchedAddress {
            id,
            address: address.to_string(),
            label: label.to_string(),
            status: WatchStatus::Active,
            added_at,
        };
        self.cache_insert(entry.clone());
        info!(label, address, "Watch list: added");
        Ok(entry)
    }

    /// Stop tracking the wallet matching `identifier` (label first, then address).
    pub async fn remove(&self, identifier: &str) -> Result<WatchedAddress, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let entry = self
            .resolve(identifier)
            .ok_or_else(|| RegistryError::NotFound(identifier.to_string()))?;

        if !self.repo.delete(entry.id).await? {
            warn!(id = entry.id, "Watch list row already gone from storage");
        }
        self.by_address.remove(&entry.address);
        self.by_label.remove(&label_key(&entry.label));
        info!(label = %entry.label, address = %entry.address, "Watch list: removed");
        Ok(entry)
    }

    /// Pause or resume the wallet matching `identifier`.
    pub async fn set_status(
        &self,
        identifier: &str,
        status: WatchStatus,
    ) -> Result<WatchedAddress, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut entry = self
            .resolve(identifier)
            .ok_or_else(|| RegistryError::NotFound(identifier.to_string()))?;

        self.repo.set_active(entry.id, status.is_active()).await?;
        entry.status = status;
        self.by_address.insert(entry.address.clone(), entry.clone());
        info!(label = %entry.label, %status, "Watch list: status changed");
        Ok(entry)
    }

    /// Pause every wallet. Returns the number of wallets in the list.
    pub async fn pause_all(&self) -> Result<usize, RegistryError> {
        self.set_all(WatchStatus::Paused).await
    }

    /// Resume every wallet. Returns the number of wallets in the list.
    pub async fn resume_all(&self) -> Result<usize, RegistryError> {
        self.set_all(WatchStatus::Active).await
    }

    async fn set_all(&self, status: WatchStatus) -> Result<usize, RegistryError> {
        let _guard = self.write_lock.lock().await;

        if self.by_address.is_empty() {
            return Ok(0);
        }
        self.repo.set_all_active(status.is_active()).await?;
        for mut entry in self.by_address.iter_mut() {
            entry.status = status;
        }
        let count = self.by_address.len();
        info!(count, %status, "Watch list: bulk status change");
        Ok(count)
    }

    /// All entries in insertion order.
    pub fn list(&self) -> WatchList {
        let mut entries: Vec<WatchedAddress> =
            self.by_address.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.id);
        WatchList { entries }
    }

    /// Hot-path membership check: tracked and not paused.
    pub fn is_active_watched(&self, address: &str) -> bool {
        self.by_address
            .get(address)
            .map_or(false, |e| e.is_active())
    }

    pub fn get(&self, address: &str) -> Option<WatchedAddress> {
        self.by_address.get(address).map(|e| e.value().clone())
    }

    /// Case-insensitive exact label match first, then exact address match.
    pub fn resolve(&self, identifier: &str) -> Option<WatchedAddress> {
        let by_label = self
            .by_label
            .get(&label_key(identifier))
            .map(|address| address.value().clone());
        if let Some(address) = by_label {
            if let Some(entry) = self.get(&address) {
                return Some(entry);
            }
        }
        self.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    fn cache_insert(&self, entry: WatchedAddress) {
        self.by_label.insert(label_key(&entry.label), entry.address.clone());
        self.by_address.insert(entry.address.clone(), entry);
    }
}

fn label_key(label: &str) -> String {
    label.to_lowercase()
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
