//! Storage contracts and the bundled in-memory / JSON-file backends.
//!
//! Concrete database backends live outside the crate; these traits are the
//! contract they implement. Stores are injected into the teller explicitly,
//! never reached through globals.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::error::VaultError;
use crate::vault::EncryptedVault;

/// Single-slot store holding the encrypted vault.
#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn get(&self) -> Result<Option<EncryptedVault>, VaultError>;
    async fn save(&self, vault: &EncryptedVault) -> Result<(), VaultError>;
}

/// Records addressable by a stable string id.
pub trait HasId {
    fn record_id(&self) -> &str;
}

/// Id-keyed collection store (sessions live here).
#[async_trait]
pub trait RecordStorage<T: HasId>: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<T>, VaultError>;
    async fn save(&self, record: &T) -> Result<(), VaultError>;
    async fn remove(&self, id: &str) -> Result<(), VaultError>;
    async fn remove_all(&self) -> Result<(), VaultError>;
    async fn list(&self) -> Result<Vec<T>, VaultError>;
}

// ---------- In-memory backends ----------

#[derive(Default)]
pub struct InMemoryVaultStore {
    slot: RwLock<Option<EncryptedVault>>,
}

impl InMemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultStore for InMemoryVaultStore {
    async fn get(&self) -> Result<Option<EncryptedVault>, VaultError> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, vault: &EncryptedVault) -> Result<(), VaultError> {
        *self.slot.write().await = Some(vault.clone());
        Ok(())
    }
}

pub struct InMemoryStorage<T> {
    records: RwLock<HashMap<String, T>>,
}

impl<T> InMemoryStorage<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for InMemoryStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> RecordStorage<T> for InMemoryStorage<T>
where
    T: HasId + Clone + Send + Sync,
{
    async fn get_by_id(&self, id: &str) -> Result<Option<T>, VaultError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save(&self, record: &T) -> Result<(), VaultError> {
        self.records
            .write()
            .await
            .insert(record.record_id().to_string(), record.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), VaultError> {
        self.records.write().await.remove(id);
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), VaultError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn list(&self) -> Result<Vec<T>, VaultError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

// ---------- JSON-file backends ----------

/// Persists the encrypted vault as a pretty JSON file.
pub struct FileVaultStore {
    path: PathBuf,
}

impl FileVaultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl VaultStore for FileVaultStore {
    async fn get(&self) -> Result<Option<EncryptedVault>, VaultError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data =
            std::fs::read_to_string(&self.path).map_err(|e| VaultError::Storage(e.to_string()))?;
        let vault = serde_json::from_str(&data).map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(Some(vault))
    }

    async fn save(&self, vault: &EncryptedVault) -> Result<(), VaultError> {
        let json =
            serde_json::to_string_pretty(vault).map_err(|e| VaultError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| VaultError::Storage(e.to_string()))
    }
}

/// Persists an id-keyed collection as one pretty JSON file.
pub struct FileStorage<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> FileStorage<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> FileStorage<T> {
    fn load(&self) -> Result<HashMap<String, T>, VaultError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data =
            std::fs::read_to_string(&self.path).map_err(|e| VaultError::Storage(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| VaultError::Storage(e.to_string()))
    }

    fn persist(&self, records: &HashMap<String, T>) -> Result<(), VaultError> {
        let json =
            serde_json::to_string_pretty(records).map_err(|e| VaultError::Storage(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| VaultError::Storage(e.to_string()))
    }
}

#[async_trait]
impl<T> RecordStorage<T> for FileStorage<T>
where
    T: HasId + Clone + Serialize + DeserializeOwned + Send + Sync,
{
    async fn get_by_id(&self, id: &str) -> Result<Option<T>, VaultError> {
        Ok(self.load()?.remove(id))
    }

    async fn save(&self, record: &T) -> Result<(), VaultError> {
        let mut records = self.load()?;
        records.insert(record.record_id().to_string(), record.clone());
        self.persist(&records)
    }

    async fn remove(&self, id: &str) -> Result<(), VaultError> {
        let mut records = self.load()?;
        records.remove(id);
        self.persist(&records)
    }

    async fn remove_all(&self) -> Result<(), VaultError> {
        self.persist(&HashMap::new())
    }

    async fn list(&self) -> Result<Vec<T>, VaultError> {
        Ok(self.load()?.into_values().collect())
    }
}
