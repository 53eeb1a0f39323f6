//! Durable "last selected guild" per operator.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

use super::durable_store::SharedDurableStore;
use crate::models::Guild;

const KEY_PREFIX: &str = "selected_guild";

/// What to select when the restored id is missing or stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionFallback {
    #[default]
    None,
    First,
}

impl FromStr for SelectionFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SelectionFallback::None),
            "first" => Ok(SelectionFallback::First),
            other => Err(format!("unknown selection fallback '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct SelectionStore {
    store: SharedDurableStore,
    key: String,
}

impl SelectionStore {
    pub fn new(store: SharedDurableStore, operator_id: &str) -> Self {
        Self {
            store,
            key: format!("{}:{}", KEY_PREFIX, operator_id),
        }
    }

    /// Write the selection. Failures are logged, never raised.
    pub async fn persist(&self, guild_id: &str) {
        if let Err(e) = self.store.set(&self.key, guild_id).await {
            warn!("Failed to persist guild selection {}: {}", guild_id, e);
        }
    }

    pub async fn restore(&self) -> Option<String> {
        let restored = self.store.get(&self.key).await;
        debug!("Restored selection for {}: {:?}", self.key, restored);
        restored
    }

    pub async fn clear(&self) {
        if let Err(e) = self.store.remove(&self.key).await {
            warn!("Failed to clear guild selection: {}", e);
        }
    }
}

/// Reconcile a restored id with a freshly fetched guild list.
/// A stale id is never an error.
pub fn reconcile_selection(
    restored: Option<&str>,
    guilds: &[Guild],
    fallback: SelectionFallback,
) -> Option<String> {
    if let Some(id) = restored {
        if guilds.iter().any(|g| g.id == id) {
            return Some(id.to_string());
        }
        debug!("Restored guild {} is no longer administrable", id);
    }

    match fallback {
        SelectionFallback::None => None,
        SelectionFallback::First => guilds.first().map(|g| g.id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JsonFileStore;
    use crate::test_support::{raw_guild, MemoryStore};
    use std::sync::Arc;

    fn guilds(ids: &[&str]) -> Vec<Guild> {
        ids.iter()
            .map(|id| Guild::from_raw(&raw_guild(id, true, 0)))
            .collect()
    }

    #[tokio::test]
    async fn test_round_trip_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.json");
        let path = path.to_str().unwrap();

        let store = SelectionStore::new(Arc::new(JsonFileStore::open(path).await.unwrap()), "u1");
        assert_eq!(store.restore().await, None);
        store.persist("g2").await;

        // Simulated reload: a fresh store over the same file
        let reloaded =
            SelectionStore::new(Arc::new(JsonFileStore::open(path).await.unwrap()), "u1");
        assert_eq!(reloaded.restore().await.as_deref(), Some("g2"));

        reloaded.clear().await;
        assert_eq!(reloaded.restore().await, None);
        let reloaded =
            SelectionStore::new(Arc::new(JsonFileStore::open(path).await.unwrap()), "u1");
        assert_eq!(reloaded.restore().await, None);
    }

    #[tokio::test]
    async fn test_selection_is_per_operator() {
        let shared: SharedDurableStore = Arc::new(MemoryStore::new());
        let alice = SelectionStore::new(shared.clone(), "alice");
        let bob = SelectionStore::new(shared, "bob");

        alice.persist("g1").await;
        assert_eq!(bob.restore().await, None);
        assert_eq!(alice.restore().await.as_deref(), Some("g1"));
    }

    #[tokio::test]
    async fn test_persist_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("selection.json");
        let store = SelectionStore::new(
            Arc::new(JsonFileStore::open(path.to_str().unwrap()).await.unwrap()),
            "u1",
        );
        store.persist("g1").await;
    }

    #[test]
    fn test_reconcile() {
        let list = guilds(&["a", "b"]);
        assert_eq!(
            reconcile_selection(Some("b"), &list, SelectionFallback::None).as_deref(),
            Some("b")
        );
        assert_eq!(reconcile_selection(Some("zz"), &list, SelectionFallback::None), None);
        assert_eq!(
            reconcile_selection(Some("zz"), &list, SelectionFallback::First).as_deref(),
            Some("a")
        );
        assert_eq!(
            reconcile_selection(None, &list, SelectionFallback::First).as_deref(),
            Some("a")
        );
        assert_eq!(reconcile_selection(Some("a"), &[], SelectionFallback::First), None);
    }

    #[test]
    fn test_fallback_from_str() {
        assert_eq!("First".parse::<SelectionFallback>(), Ok(SelectionFallback::First));
        assert!("sometimes".parse::<SelectionFallback>().is_err());
    }
}
