use serde_json::Value;
use std::borrow::Cow;

use crate::record::value_to_text;

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Render any JSON value as XML under `root`.
///
/// Top-level array elements each become a `<record>`. Inside a record, a
/// scalar field is `<key>text</key>`, an object field wraps its content in
/// `<item>`, and array elements are named `item_0`, `item_1`, ... after
/// their position. A null field reads `null`; a null element anywhere else
/// renders empty.
pub fn to_xml(data: &Value, root: &str) -> String {
    let root = element_name(root);
    let body = match data {
        Value::Array(items) => items
            .iter()
            .map(|item| render(item, "record"))
            .collect::<Vec<_>>()
            .join("\n"),
        other => render(other, "record"),
    };

    format!("{}<{root}>\n{}\n</{root}>", XML_HEADER, body, root = root)
}

fn render(value: &Value, name: &str) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| render(item, &format!("{}_{}", name, index)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(fields) => {
            let content = fields
                .iter()
                .map(|(key, field)| {
                    let key = element_name(key);
                    match field {
                        Value::Object(_) | Value::Array(_) => {
                            format!("<{key}>\n{}\n</{key}>", render(field, "item"), key = key)
                        }
                        Value::Null => format!("<{key}>null</{key}>", key = key),
                        scalar => format!("<{key}>{}</{key}>", escape(scalar), key = key),
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("<{name}>\n{}\n</{name}>", content, name = name)
        }
        scalar => format!("<{name}>{}</{name}>", escape(scalar), name = name),
    }
}

fn escape(value: &Value) -> String {
    let text = value_to_text(value);
    html_escape::encode_quoted_attribute(&text).into_owned()
}

/// Make a field name usable as an element name: characters outside
/// letters, digits, `_`, `-` and `.` become `_`, and names that cannot start
/// an element get a leading `_`.
pub fn element_name(key: &str) -> Cow<'_, str> {
    let valid_start = key
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = key
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid_start && valid_rest {
        return Cow::Borrowed(key);
    }

    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    Cow::Owned(name)
}
