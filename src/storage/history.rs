use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{keys, load, update, KeyValueStore};
use crate::error::BurpResult;

/// One scrape submission, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCallLogEntry {
    pub id: String,
    pub scraper: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ApiCallLogEntry {
    pub fn success(scraper: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scraper: scraper.into(),
            success: true,
            timestamp: Utc::now(),
            error: None,
            parameters,
        }
    }

    pub fn failure(
        scraper: impl Into<String>,
        parameters: Map<String, Value>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            success: false,
            ..Self::success(scraper, parameters)
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Call history kept under `apiCallHistory`, oldest first, capped at `limit`
#[derive(Clone)]
pub struct CallHistory {
    store: Arc<dyn KeyValueStore>,
    limit: usize,
    max_write_attempts: usize,
}

impl CallHistory {
    pub fn new(store: Arc<dyn KeyValueStore>, limit: usize, max_write_attempts: usize) -> Self {
        Self {
            store,
            limit,
            max_write_attempts,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append an entry, evicting the oldest past the cap. Returns the new length.
    pub async fn append(&self, entry: ApiCallLogEntry) -> BurpResult<usize> {
        let limit = self.limit;
        let entries = update::<Vec<ApiCallLogEntry>, _>(
            self.store.as_ref(),
            keys::API_CALL_HISTORY,
            self.max_write_attempts,
            |current| {
                let mut entries = current.unwrap_or_default();
                entries.push(entry.clone());
                if entries.len() > limit {
                    let excess = entries.len() - limit;
                    entries.drain(..excess);
                }
                Ok(entries)
            },
        )
        .await?;

        Ok(entries.len())
    }

    pub async fn list(&self) -> BurpResult<Vec<ApiCallLogEntry>> {
        Ok(load(self.store.as_ref(), keys::API_CALL_HISTORY)
            .await?
            .unwrap_or_default())
    }

    pub async fn clear(&self) -> BurpResult<()> {
        if self.store.remove(keys::API_CALL_HISTORY).await? {
            info!("Call history cleared");
        }
        Ok(())
    }
}
