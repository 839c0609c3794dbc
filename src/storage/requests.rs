use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::{keys, load, update, KeyValueStore};
use crate::error::{BurpError, BurpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = BurpError;

    fn from_str(s: &str) -> BurpResult<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(BurpError::validation(format!("Unknown priority: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
}

/// A request to add scraping support for a website
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteRequest {
    pub id: i64,
    pub website_name: String,
    pub website_url: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
    pub email: String,
    #[serde(default)]
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: RequestStatus,
}

/// Form input for a new [`WebsiteRequest`]
#[derive(Debug, Clone, Default)]
pub struct NewWebsiteRequest {
    pub website_name: String,
    pub website_url: String,
    pub data_type: String,
    pub description: String,
    pub email: String,
    pub priority: Priority,
}

impl NewWebsiteRequest {
    /// Name, URL and email are required; the URL must be absolute http(s).
    pub fn validate(&self) -> BurpResult<()> {
        for (name, value) in [
            ("websiteName", &self.website_name),
            ("websiteUrl", &self.website_url),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(BurpError::MissingParameter { name: name.to_string() });
            }
        }

        match Url::parse(self.website_url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(BurpError::InvalidParameter {
                    name: "websiteUrl".to_string(),
                    reason: "must be an http(s) URL".to_string(),
                })
            }
        }

        if !self.email.contains('@') {
            return Err(BurpError::InvalidParameter {
                name: "email".to_string(),
                reason: "must be an email address".to_string(),
            });
        }

        Ok(())
    }
}

/// Website requests kept under `websiteRequests`
#[derive(Clone)]
pub struct RequestBoard {
    store: Arc<dyn KeyValueStore>,
    max_write_attempts: usize,
}

impl RequestBoard {
    pub fn new(store: Arc<dyn KeyValueStore>, max_write_attempts: usize) -> Self {
        Self {
            store,
            max_write_attempts,
        }
    }

    /// Validate and append a request in `pending` state
    pub async fn submit(&self, input: NewWebsiteRequest) -> BurpResult<WebsiteRequest> {
        input.validate()?;

        let now = Utc::now();
        let request = WebsiteRequest {
            id: now.timestamp_millis(),
            website_name: input.website_name.trim().to_string(),
            website_url: input.website_url.trim().to_string(),
            data_type: input.data_type,
            description: input.description,
            email: input.email.trim().to_string(),
            priority: input.priority,
            timestamp: now,
            status: RequestStatus::Pending,
        };

        update::<Vec<WebsiteRequest>, _>(
            self.store.as_ref(),
            keys::WEBSITE_REQUESTS,
            self.max_write_attempts,
            |current| {
                let mut requests = current.unwrap_or_default();
                requests.push(request.clone());
                Ok(requests)
            },
        )
        .await?;

        info!("Website request submitted: {}", request.website_name);
        Ok(request)
    }

    pub async fn list(&self) -> BurpResult<Vec<WebsiteRequest>> {
        Ok(load(self.store.as_ref(), keys::WEBSITE_REQUESTS)
            .await?
            .unwrap_or_default())
    }
}
