use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::record::value_to_text;

/// Header row plus string cells, every row as wide as the header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMatrix {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableMatrix {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ncols(&self) -> usize {
        self.headers.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Rebuild `header → cell` records from rows
    pub fn rows_to_records<'a, I>(&self, rows: I) -> Vec<Map<String, Value>>
    where
        I: IntoIterator<Item = &'a Vec<String>>,
    {
        rows.into_iter()
            .map(|row| {
                self.headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, cell)| (h.clone(), Value::String(cell.clone())))
                    .collect()
            })
            .collect()
    }
}

/// Union of keys across records, in first-seen order.
///
/// Shared by the table view and the CSV/Excel exports so both agree on
/// column order.
pub fn header_union<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    let mut seen = std::collections::HashSet::new();
    let mut headers = Vec::new();

    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                headers.push(key.clone());
            }
        }
    }

    headers
}

/// Build the header/row matrix. Missing fields render as empty strings.
pub fn to_table(records: &[Map<String, Value>]) -> TableMatrix {
    let headers = header_union(records);

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map(value_to_text).unwrap_or_default())
                .collect()
        })
        .collect();

    TableMatrix { headers, rows }
}

/// Keep rows where any cell contains `query`, ignoring case
pub fn filter_rows(rows: &[Vec<String>], query: &str) -> Vec<Vec<String>> {
    if query.is_empty() {
        return rows.to_vec();
    }

    let needle = query.to_lowercase();
    rows.iter()
        .filter(|row| row.iter().any(|cell| cell.to_lowercase().contains(&needle)))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Asc => "↑",
            SortDirection::Desc => "↓",
        }
    }
}

/// Sort rows in place by column.
///
/// Cells that both parse as numbers (browser `parseFloat` rules) compare
/// numerically; anything else compares as lowercase text. Equal rows keep
/// their relative order.
pub fn sort_rows(rows: &mut Vec<Vec<String>>, column: usize, direction: SortDirection) {
    let compare = |a: &Vec<String>, b: &Vec<String>| {
        let a = a.get(column).map(String::as_str).unwrap_or("");
        let b = b.get(column).map(String::as_str).unwrap_or("");
        let ordering = compare_cells(a, b);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    };

    merge_sort_by(rows, &compare);
}

/// Numeric-aware cell comparison
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    match (parse_float_prefix(a), parse_float_prefix(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Longest leading decimal number, like `parseFloat`: `"4.5 out of 5"` → 4.5,
/// `"₹1,299"` → None, `"1,299"` → 1.
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let number = NUMBER.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("static number pattern")
    });

    let trimmed = text.trim_start();
    let matched = number.find(trimmed)?.as_str();

    match matched.trim_start_matches(['+', '-']) {
        "Infinity" if matched.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => matched.parse::<f64>().ok(),
    }
}

/// Stable merge sort that tolerates comparators which are not a total order.
///
/// Mixed numeric/text columns make `compare_cells` intransitive, which the
/// std sorts are allowed to panic on.
fn merge_sort_by<T: Clone, F>(items: &mut Vec<T>, compare: &F)
where
    F: Fn(&T, &T) -> Ordering,
{
    let len = items.len();
    if len < 2 {
        return;
    }

    let mut buffer = items.clone();
    let mut width = 1;
    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right, mut out) = (start, mid, start);

            while left < mid && right < end {
                if compare(&items[right], &items[left]) == Ordering::Less {
                    buffer[out] = items[right].clone();
                    right += 1;
                } else {
                    buffer[out] = items[left].clone();
                    left += 1;
                }
                out += 1;
            }
            while left < mid {
                buffer[out] = items[left].clone();
                left += 1;
                out += 1;
            }
            while right < end {
                buffer[out] = items[right].clone();
                right += 1;
                out += 1;
            }

            start = end;
        }
        std::mem::swap(items, &mut buffer);
        width *= 2;
    }
}

/// One page of rows, `page` counted from 1. Out-of-range pages are empty.
pub fn paginate<T>(rows: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }

    let start = (page - 1).saturating_mul(page_size);
    if start >= rows.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(rows.len());
    &rows[start..end]
}

/// Number of pages needed for `total` rows
pub fn total_pages(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::table::flatten::flatten_all;
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_header_union_first_seen_order() {
        let recs = records(vec![
            json!({"name": "A", "price": 1}),
            json!({"rating": 4, "name": "B"}),
            json!({"url": "u"}),
        ]);
        assert_eq!(header_union(&recs), vec!["name", "price", "rating", "url"]);
    }

    #[test]
    fn test_to_table_pads_missing_cells() {
        let recs = records(vec![
            json!({"name": "Echo", "price": 3499}),
            json!({"name": "Kindle", "tags": {"x": 1}}),
            json!({}),
        ]);
        let table = to_table(&recs);

        assert_eq!(table.headers, vec!["name", "price", "tags"]);
        assert_eq!(table.rows.len(), 3);
        for row in &table.rows {
            assert_eq!(row.len(), table.headers.len());
        }
        assert_eq!(table.rows[0], vec!["Echo", "3499", ""]);
        assert_eq!(table.rows[1], vec!["Kindle", "", r#"{"x":1}"#]);
        assert_eq!(table.rows[2], vec!["", "", ""]);
    }

    #[test]
    fn test_flattened_table_shape() {
        let recs = records(vec![
            json!({"name": "A", "specs": {"ram": "8GB", "cpu": {"cores": 8}}}),
            json!({"name": "B", "colors": ["red", "blue"]}),
            json!({"name": null}),
        ]);
        let table = to_table(&flatten_all(&recs));

        assert_eq!(table.nrows(), recs.len());
        assert!(table.rows.iter().all(|r| r.len() == table.ncols()));
        assert_eq!(
            table.headers,
            vec!["name", "specs.ram", "specs.cpu.cores", "colors"]
        );
        assert_eq!(table.rows[1][3], "red; blue");
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let rows = vec![
            vec!["Amazon Echo".to_string(), "3499".to_string()],
            vec!["Kindle".to_string(), "9999".to_string()],
        ];
        let hits = filter_rows(&rows, "AMA");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0][0], "Amazon Echo");

        assert_eq!(filter_rows(&rows, "").len(), 2);
        assert!(filter_rows(&rows, "[a-z]").is_empty());
    }

    #[test]
    fn test_numeric_sort() {
        let mut rows = vec![
            vec!["5".to_string()],
            vec!["20".to_string()],
            vec!["3".to_string()],
        ];
        sort_rows(&mut rows, 0, SortDirection::Asc);
        let order: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(order, vec!["3", "5", "20"]);

        sort_rows(&mut rows, 0, SortDirection::Desc);
        let order: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(order, vec!["20", "5", "3"]);
    }

    #[test]
    fn test_text_sort_ignores_case_and_is_stable() {
        let mut rows = vec![
            vec!["banana".to_string(), "1".to_string()],
            vec!["Apple".to_string(), "2".to_string()],
            vec!["apple".to_string(), "3".to_string()],
            vec!["cherry".to_string(), "4".to_string()],
        ];
        sort_rows(&mut rows, 0, SortDirection::Asc);
        let ids: Vec<&str> = rows.iter().map(|r| r[1].as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1", "4"]);
    }

    #[test]
    fn test_mixed_column_sort_does_not_panic() {
        let mut rows: Vec<Vec<String>> = ["2", "10", "1x", "", "abc", "3.5", "-1", "N/A"]
            .iter()
            .map(|s| vec![s.to_string()])
            .collect();
        sort_rows(&mut rows, 0, SortDirection::Asc);
        assert_eq!(rows.len(), 8);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("42"), Some(42.0));
        assert_eq!(parse_float_prefix("  4.5 out of 5"), Some(4.5));
        assert_eq!(parse_float_prefix("1,299"), Some(1.0));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("-2e3x"), Some(-2000.0));
        assert_eq!(parse_float_prefix("₹1,299"), None);
        assert_eq!(parse_float_prefix(""), None);
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_pagination() {
        let rows: Vec<usize> = (0..25).collect();
        assert_eq!(paginate(&rows, 2, 10), &rows[10..20]);
        assert_eq!(paginate(&rows, 3, 10), &rows[20..25]);
        assert!(paginate(&rows, 4, 10).is_empty());
        assert!(paginate(&rows, 0, 10).is_empty());
        assert!(paginate(&rows, 1, 0).is_empty());
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(0, 10), 0);
    }

    #[test]
    fn test_rows_to_records() {
        let table = TableMatrix {
            headers: vec!["name".into(), "price".into()],
            rows: vec![vec!["Echo".into(), "10".into()]],
        };
        let recs = table.rows_to_records(&table.rows);
        assert_eq!(recs[0]["name"], json!("Echo"));
        assert_eq!(recs[0]["price"], json!("10"));
    }
}
