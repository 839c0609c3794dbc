use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{value_to_text, Record};

/// Input widget type of a scraper parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    #[default]
    Text,
    Number,
    Select,
}

/// One input a scraper accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ParameterSpec {
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    /// Allowed values of a select. Options are plain values or
    /// `{value, label}` objects.
    pub fn option_values(&self) -> Vec<String> {
        self.options
            .iter()
            .flatten()
            .map(|option| match option.get("value") {
                Some(value) => value_to_text(value),
                None => value_to_text(option),
            })
            .collect()
    }
}

/// A scraper advertised by the backend. `id` is the key it is listed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ScraperConfig {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Parameter values pre-filled from each spec's default
    pub fn default_parameters(&self) -> Map<String, Value> {
        self.parameters
            .iter()
            .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
            .collect()
    }
}

/// `GET /api/scrapers` body
#[derive(Debug, Deserialize)]
pub(crate) struct ScrapersEnvelope {
    pub scrapers: Map<String, Value>,
}

/// `POST /api/scrape` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub scraper_id: String,
    pub parameters: Map<String, Value>,
}

/// `POST /api/scrape` response envelope
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScrapeEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Counters the scrapers report next to their records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_products: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_with_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_with_rating: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_with_discounts: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of a successful scrape.
///
/// The backend's JSON is kept as received and the typed fields are read
/// from it, so serialising the result back out is lossless. Fields with
/// an unexpected shape read as absent instead of failing the scrape.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub summary: Summary,
    pub products: Vec<Record>,
    pub search_term: Option<String>,
    pub scraper_used: Option<String>,
    pub timestamp: Option<String>,
    /// Top-level keys other than the ones above
    pub extra: Map<String, Value>,
    raw: Value,
}

impl ScrapeResult {
    const KNOWN_KEYS: [&'static str; 5] =
        ["summary", "products", "search_term", "scraper_used", "timestamp"];

    pub fn from_value(raw: Value) -> Self {
        let empty = Map::new();
        let object = raw.as_object().unwrap_or(&empty);
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(String::from);

        let summary = object
            .get("summary")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value::<Summary>(v.clone()).ok())
            .unwrap_or_default();
        let products = object
            .get("products")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let extra = object
            .iter()
            .filter(|(key, _)| !Self::KNOWN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            summary,
            products,
            search_term: text("search_term"),
            scraper_used: text("scraper_used"),
            timestamp: text("timestamp"),
            extra,
            raw,
        }
    }

    pub fn record_count(&self) -> usize {
        self.products.len()
    }

    /// The payload exactly as the backend sent it
    pub fn to_value(&self) -> Value {
        self.raw.clone()
    }
}

impl Default for ScrapeResult {
    fn default() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }
}

/// `GET /api/health` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub available_scrapers: Vec<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
