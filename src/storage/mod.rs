//! Persistent key/value state: login, settings, call history, profile and
//! website requests.
//!
//! Every key holds one JSON document with a version that increases on each
//! write. Read-modify-write updates go through [`update`], which retries on
//! a version conflict so two processes sharing a database never drop each
//! other's writes.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub mod history;
pub mod memory;
pub mod migrations;
pub mod preferences;
pub mod requests;
pub mod sqlite;

pub use history::{ApiCallLogEntry, CallHistory};
pub use memory::MemoryStore;
pub use preferences::{AppSettings, Palette, Preferences, Theme, UserAccount, UserProfile};
pub use requests::{NewWebsiteRequest, Priority, RequestBoard, RequestStatus, WebsiteRequest};
pub use sqlite::SqliteStore;

use crate::error::{BurpError, BurpResult};

/// Store keys
pub mod keys {
    pub const USER: &str = "user";
    pub const APP_SETTINGS: &str = "appSettings";
    pub const API_CALL_HISTORY: &str = "apiCallHistory";
    pub const USER_PROFILE: &str = "userProfile";
    pub const WEBSITE_REQUESTS: &str = "websiteRequests";
}

pub(crate) const EVENT_CAPACITY: usize = 64;

/// A stored value and the version it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

/// Change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Set { key: String, version: i64 },
    Removed { key: String },
}

impl StoreEvent {
    pub fn key(&self) -> &str {
        match self {
            StoreEvent::Set { key, .. } | StoreEvent::Removed { key } => key,
        }
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> BurpResult<Option<Versioned<Value>>>;

    /// Unconditional write; returns the new version
    async fn set(&self, key: &str, value: Value) -> BurpResult<i64>;

    /// Write only if the key is still at `expected` (`None`: still absent).
    /// Otherwise fails with [`BurpError::VersionConflict`].
    async fn compare_and_set(&self, key: &str, value: Value, expected: Option<i64>) -> BurpResult<i64>;

    /// Returns whether the key existed
    async fn remove(&self, key: &str) -> BurpResult<bool>;

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Read and decode a key
pub async fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> BurpResult<Option<T>> {
    match store.get(key).await? {
        Some(stored) => Ok(Some(serde_json::from_value(stored.value)?)),
        None => Ok(None),
    }
}

/// Encode and write a key
pub async fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> BurpResult<i64> {
    store.set(key, serde_json::to_value(value)?).await
}

/// Read-modify-write with compare-and-set.
///
/// `apply` receives the current value (or `None`) and returns the new one.
/// On a version conflict the read is repeated, at most `max_attempts` times.
pub async fn update<T, F>(
    store: &dyn KeyValueStore,
    key: &str,
    max_attempts: usize,
    mut apply: F,
) -> BurpResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> BurpResult<T>,
{
    let attempts = max_attempts.max(1);
    let mut last_conflict = None;

    for attempt in 1..=attempts {
        let current = store.get(key).await?;
        let expected = current.as_ref().map(|c| c.version);
        let value = match current {
            Some(stored) => Some(serde_json::from_value(stored.value)?),
            None => None,
        };

        let next = apply(value)?;
        match store
            .compare_and_set(key, serde_json::to_value(&next)?, expected)
            .await
        {
            Ok(version) => {
                debug!("Updated {} to version {} (attempt {})", key, version, attempt);
                return Ok(next);
            }
            Err(conflict @ BurpError::VersionConflict { .. }) => {
                warn!("Concurrent write to {}, retrying (attempt {})", key, attempt);
                last_conflict = Some(conflict);
            }
            Err(other) => return Err(other),
        }
    }

    Err(last_conflict.unwrap_or_else(|| BurpError::storage(format!("update of {} gave up", key))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_typed_load_and_save() {
        let store = MemoryStore::new();
        assert_eq!(load::<Vec<u32>>(&store, "nums").await.unwrap(), None);

        save(&store, "nums", &vec![1u32, 2]).await.unwrap();
        assert_eq!(load::<Vec<u32>>(&store, "nums").await.unwrap(), Some(vec![1, 2]));

        store.set("nums", json!("not a list")).await.unwrap();
        assert!(matches!(
            load::<Vec<u32>>(&store, "nums").await,
            Err(BurpError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_in_memory().unwrap());

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                update::<Vec<u32>, _>(store.as_ref(), "list", 50, |current| {
                    let mut list = current.unwrap_or_default();
                    list.push(i);
                    Ok(list)
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut list: Vec<u32> = load(store.as_ref(), "list").await.unwrap().unwrap();
        list.sort();
        assert_eq!(list, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_update_surfaces_persistent_conflict() {
        struct AlwaysStale(MemoryStore);

        #[async_trait]
        impl KeyValueStore for AlwaysStale {
            async fn get(&self, key: &str) -> BurpResult<Option<Versioned<Value>>> {
                self.0.get(key).await
            }
            async fn set(&self, key: &str, value: Value) -> BurpResult<i64> {
                self.0.set(key, value).await
            }
            async fn compare_and_set(&self, key: &str, _value: Value, expected: Option<i64>) -> BurpResult<i64> {
                Err(BurpError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    found: Some(99),
                })
            }
            async fn remove(&self, key: &str) -> BurpResult<bool> {
                self.0.remove(key).await
            }
            fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
                self.0.subscribe()
            }
        }

        let store = AlwaysStale(MemoryStore::new());
        let mut calls = 0;
        let result = update::<u32, _>(&store, "n", 3, |_| {
            calls += 1;
            Ok(1)
        })
        .await;

        assert!(matches!(result, Err(BurpError::VersionConflict { .. })));
        assert_eq!(calls, 3);
    }
}
