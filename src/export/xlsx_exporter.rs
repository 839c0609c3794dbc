use tracing::debug;

use super::cell_text;
use crate::record::Record;
use crate::table::header_union;

/// Render records as tab-separated text for spreadsheet import.
///
/// Saved with an `.xlsx` extension although the content is plain TSV.
/// Tabs and newlines inside values become single spaces and nothing is
/// quoted, so the conversion is lossy.
pub fn to_tsv(records: &[Record]) -> String {
    if records.is_empty() {
        return String::new();
    }

    let headers = header_union(records);
    debug!("Rendering {} records as TSV ({} columns)", records.len(), headers.len());

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(headers.join("\t"));

    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|h| cell_text(record, h).replace(['\t', '\n'], " "))
            .collect();
        lines.push(row.join("\t"));
    }

    lines.join("\n")
}
