use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::error::{DashboardError, Result};

/// String key/value storage that survives restarts
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedDurableStore = Arc<dyn DurableStore>;

/// On-disk format of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    /// Schema version
    version: u32,

    /// Last update timestamp
    last_updated: u64,

    entries: HashMap<String, String>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: current_timestamp(),
            entries: HashMap::new(),
        }
    }
}

/// A single JSON file, rewritten atomically on every change
pub struct JsonFileStore {
    path: String,
    file: RwLock<StoreFile>,
}

impl JsonFileStore {
    /// Load from file, or start empty if it doesn't exist yet
    pub async fn open(path: &str) -> Result<Self> {
        let file = match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| DashboardError::StateParse {
                    path: path.to_string(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => {
                return Err(DashboardError::StateLoad {
                    path: path.to_string(),
                    source: e,
                })
            }
        };

        Ok(Self {
            path: path.to_string(),
            file: RwLock::new(file),
        })
    }

    async fn save(&self, file: &StoreFile) -> Result<()> {
        let content = serde_json::to_string_pretty(file)?;

        let temp_path = format!("{}.tmp", self.path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| DashboardError::StateSave {
                path: self.path.clone(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DashboardError::StateSave {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(())
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.file.read().await.entries.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut file = self.file.write().await;
        file.entries.insert(key.to_string(), value.to_string());
        file.last_updated = current_timestamp();
        self.save(&file).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut file = self.file.write().await;
        if file.entries.remove(key).is_none() {
            return Ok(());
        }
        file.last_updated = current_timestamp();
        self.save(&file).await
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let path = path.to_str().unwrap();

        let store = JsonFileStore::open(path).await.unwrap();
        assert_eq!(store.get("k").await, None);
        store.set("k", "v").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(path).await.unwrap();
        assert_eq!(reopened.get("k").await.as_deref(), Some("v"));

        reopened.remove("k").await.unwrap();
        let reopened = JsonFileStore::open(path).await.unwrap();
        assert_eq!(reopened.get("k").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let result = JsonFileStore::open(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(DashboardError::StateParse { .. })));
    }

    #[tokio::test]
    async fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("store.json");
        let store = JsonFileStore::open(path.to_str().unwrap()).await.unwrap();

        let result = store.set("k", "v").await;
        assert!(matches!(result, Err(DashboardError::StateSave { .. })));
    }
}
