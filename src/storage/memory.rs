use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use super::{KeyValueStore, StoreEvent, Versioned, EVENT_CAPACITY};
use crate::error::{BurpError, BurpResult};

/// Process-local store with the same versioning rules as [`super::SqliteStore`]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Versioned<Value>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> BurpResult<Option<Versioned<Value>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> BurpResult<i64> {
        let version = {
            let mut entries = self.entries.write().await;
            let version = entries.get(key).map(|e| e.version).unwrap_or(0) + 1;
            entries.insert(key.to_string(), Versioned { value, version });
            version
        };
        let _ = self.events.send(StoreEvent::Set {
            key: key.to_string(),
            version,
        });
        Ok(version)
    }

    async fn compare_and_set(&self, key: &str, value: Value, expected: Option<i64>) -> BurpResult<i64> {
        let version = {
            let mut entries = self.entries.write().await;
            let found = entries.get(key).map(|e| e.version);
            if found != expected {
                return Err(BurpError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    found,
                });
            }
            let version = found.unwrap_or(0) + 1;
            entries.insert(key.to_string(), Versioned { value, version });
            version
        };
        let _ = self.events.send(StoreEvent::Set {
            key: key.to_string(),
            version,
        });
        Ok(version)
    }

    async fn remove(&self, key: &str) -> BurpResult<bool> {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            let _ = self.events.send(StoreEvent::Removed { key: key.to_string() });
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_versions_increase() {
        let store = MemoryStore::new();
        assert_eq!(store.set("a", json!(1)).await.unwrap(), 1);
        assert_eq!(store.compare_and_set("a", json!(2), Some(1)).await.unwrap(), 2);
        assert!(store.compare_and_set("a", json!(3), Some(1)).await.is_err());
        assert!(store.remove("a").await.unwrap());
        assert_eq!(store.compare_and_set("a", json!(4), None).await.unwrap(), 1);
    }
}
