use serde_json::{Map, Value};

use crate::record::{value_to_text, Record};

/// Record with nested objects collapsed into dotted keys
pub type FlatRecord = Map<String, Value>;

/// Separator placed between array elements
pub const ARRAY_SEPARATOR: &str = "; ";

/// Flatten one record.
///
/// - null becomes an empty string
/// - nested objects recurse as `parent.child`; identical paths are last-wins
/// - arrays are joined with `"; "`; objects inside arrays are kept as JSON text
///   rather than flattened, so their structure is lost in table form
/// - scalars keep their JSON type
pub fn flatten(record: &Record) -> FlatRecord {
    let mut flat = FlatRecord::new();
    flatten_into(record, "", &mut flat);
    flat
}

/// Flatten a batch, preserving order
pub fn flatten_all(records: &[Record]) -> Vec<FlatRecord> {
    records.iter().map(flatten).collect()
}

fn flatten_into(object: &Map<String, Value>, prefix: &str, flat: &mut FlatRecord) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Null => {
                flat.insert(path, Value::String(String::new()));
            }
            Value::Object(nested) => flatten_into(nested, &path, flat),
            Value::Array(items) => {
                flat.insert(path, Value::String(join_array(items)));
            }
            scalar => {
                flat.insert(path, scalar.clone());
            }
        }
    }
}

fn join_array(items: &[Value]) -> String {
    items
        .iter()
        .map(array_element_text)
        .collect::<Vec<_>>()
        .join(ARRAY_SEPARATOR)
}

/// Nested arrays read as comma-joined elements, like a browser's `Array.join`.
fn array_element_text(value: &Value) -> String {
    match value {
        Value::Array(inner) => inner
            .iter()
            .map(array_element_text)
            .collect::<Vec<_>>()
            .join(","),
        other => value_to_text(other),
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
    fn test_flatten_nested_and_arrays() {
        let flat = flatten(&record(json!({"a": {"b": 1}, "c": [1, 2]})));
        assert_eq!(flat.get("a.b"), Some(&json!(1)));
        assert_eq!(flat.get("c"), Some(&json!("1; 2")));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_flatten_nulls_and_deep_paths() {
        let flat = flatten(&record(json!({
            "name": "Kettle",
            "seller": {"name": null, "address": {"city": "Pune"}},
            "empty": {}
        })));

        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "seller.name", "seller.address.city"]);
        assert_eq!(flat["seller.name"], json!(""));
        assert_eq!(flat["seller.address.city"], json!("Pune"));
    }

    #[test]
    fn test_arrays_of_objects_stay_as_text() {
        let flat = flatten(&record(json!({
            "offers": [{"bank": "HDFC"}, {"bank": "SBI"}],
            "matrix": [[1, 2], [3]],
            "tags": ["a", null, true]
        })));

        assert_eq!(flat["offers"], json!(r#"{"bank":"HDFC"}; {"bank":"SBI"}"#));
        assert_eq!(flat["matrix"], json!("1,2; 3"));
        assert_eq!(flat["tags"], json!("a; ; true"));
    }

    #[test]
    fn test_flatten_all_preserves_order() {
        let records = vec![
            record(json!({"id": 2})),
            record(json!({"id": 1})),
            record(json!({})),
        ];
        let flat = flatten_all(&records);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0]["id"], json!(2));
        assert_eq!(flat[1]["id"], json!(1));
        assert!(flat[2].is_empty());
    }

    #[test]
    fn test_dotted_collision_is_last_wins() {
        let flat = flatten(&record(json!({"a.b": "literal", "a": {"b": "nested"}})));
        assert_eq!(flat["a.b"], json!("nested"));
        assert_eq!(flat.len(), 1);
    }
}
