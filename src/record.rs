//! Scraped records.
//!
//! A record is an ordered map of field name to JSON value. Field sets differ
//! per scraper family (shops, video search, encyclopedia), so the map stays
//! generic and [`RecordView`] offers typed accessors on top of it instead of
//! ad hoc `name || title || youtube_url` chains at every call site.

use serde_json::{Map, Value};

/// One scraped item. Keys keep their insertion order.
pub type Record = Map<String, Value>;

/// Scraper family inferred from the fields a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Product,
    Video,
    Article,
    Generic,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Product => write!(f, "product"),
            RecordKind::Video => write!(f, "video"),
            RecordKind::Article => write!(f, "article"),
            RecordKind::Generic => write!(f, "generic"),
        }
    }
}

/// Convert a JSON value to text the way a browser's `String(value)` would.
///
/// Objects and arrays are rendered as compact JSON, which is what the table
/// and CSV paths want for nested leftovers.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_text(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Integral floats print without a fractional part (`3.0` → `3`).
pub fn number_to_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Typed, read-only accessors over a record
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    record: &'a Record,
}

impl<'a> RecordView<'a> {
    pub fn new(record: &'a Record) -> Self {
        Self { record }
    }

    pub fn kind(&self) -> RecordKind {
        if self.has("youtube_url") || self.has("creator_name") {
            RecordKind::Video
        } else if self.has("snippet") || self.has("pageid") {
            RecordKind::Article
        } else if self.has("price") || self.has("price_numeric") || self.has("brand") {
            RecordKind::Product
        } else {
            RecordKind::Generic
        }
    }

    fn has(&self, key: &str) -> bool {
        self.record.get(key).map(is_present).unwrap_or(false)
    }

    /// Non-empty text of a field
    pub fn text(&self, key: &str) -> Option<String> {
        self.record
            .get(key)
            .filter(|v| is_present(v))
            .map(value_to_text)
    }

    fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    pub fn title(&self) -> Option<String> {
        self.first_text(&["name", "title", "youtube_url"])
    }

    pub fn link(&self) -> Option<String> {
        self.first_text(&["url", "youtube_url"])
    }

    pub fn link_label(&self) -> &'static str {
        if self.has("youtube_url") {
            "Watch Video"
        } else if self.has("url") {
            "View Page"
        } else {
            "View Item"
        }
    }

    pub fn image_url(&self) -> Option<String> {
        self.text("image_url")
    }

    pub fn brand(&self) -> Option<String> {
        self.text("brand")
    }

    pub fn price(&self) -> Option<String> {
        self.text("price")
    }

    pub fn original_price(&self) -> Option<String> {
        self.text("original_price")
    }

    pub fn discount(&self) -> Option<String> {
        self.text("discount_percentage")
    }

    pub fn rating(&self) -> Option<String> {
        self.text("rating")
    }

    pub fn creator(&self) -> Option<String> {
        self.text("creator_name")
    }

    pub fn snippet(&self) -> Option<String> {
        self.text("snippet")
    }

    pub fn upload_date(&self) -> Option<String> {
        self.text("upload_date")
    }

    pub fn like_count(&self) -> Option<u64> {
        self.record.get("like_count").and_then(Value::as_u64)
    }

    /// Duration in seconds rendered as `m:ss`
    pub fn duration(&self) -> Option<String> {
        let seconds = self.record.get("duration").and_then(Value::as_f64)?;
        if seconds <= 0.0 {
            return None;
        }
        let seconds = seconds as u64;
        Some(format!("{}:{:02}", seconds / 60, seconds % 60))
    }
}

/// JS truthiness for the fields the cards display
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!(null)), "");
        assert_eq!(value_to_text(&json!(3.0)), "3");
        assert_eq!(value_to_text(&json!(4.5)), "4.5");
        assert_eq!(value_to_text(&json!(-12)), "-12");
        assert_eq!(value_to_text(&json!(true)), "true");
        assert_eq!(value_to_text(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(value_to_text(&json!([1, "x"])), r#"[1,"x"]"#);
    }

    #[test]
    fn test_record_kinds() {
        let product = record(json!({"name": "Echo Dot", "price": "₹4,499", "brand": "Amazon"}));
        let video = record(json!({"youtube_url": "https://youtu.be/x", "creator_name": "chan"}));
        let article = record(json!({"title": "Alan Turing", "snippet": "mathematician"}));
        let other = record(json!({"foo": "bar"}));

        assert_eq!(RecordView::new(&product).kind(), RecordKind::Product);
        assert_eq!(RecordView::new(&video).kind(), RecordKind::Video);
        assert_eq!(RecordView::new(&article).kind(), RecordKind::Article);
        assert_eq!(RecordView::new(&other).kind(), RecordKind::Generic);
    }

    #[test]
    fn test_accessor_fallbacks() {
        let video = record(json!({
            "title": "",
            "youtube_url": "https://youtu.be/abc",
            "duration": 185,
            "like_count": 1200
        }));
        let view = RecordView::new(&video);

        assert_eq!(view.title().as_deref(), Some("https://youtu.be/abc"));
        assert_eq!(view.link().as_deref(), Some("https://youtu.be/abc"));
        assert_eq!(view.link_label(), "Watch Video");
        assert_eq!(view.duration().as_deref(), Some("3:05"));
        assert_eq!(view.like_count(), Some(1200));
        assert!(view.price().is_none());
    }
}
