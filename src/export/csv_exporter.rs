use csv::{QuoteStyle, WriterBuilder};
use tracing::debug;

use super::cell_text;
use crate::error::{BurpError, BurpResult};
use crate::record::Record;
use crate::table::header_union;

/// Render records as CSV.
///
/// Columns are the header union in first-seen order. Fields holding a comma,
/// quote, CR or LF are quoted with inner quotes doubled; nested values are
/// written as compact JSON. A row that is a single empty field is a blank
/// line. Empty input yields an empty string and there is no trailing newline.
pub fn to_csv(records: &[Record]) -> BurpResult<String> {
    let headers = header_union(records);
    if records.is_empty() || headers.is_empty() {
        return Ok(String::new());
    }

    debug!("Rendering {} records as CSV ({} columns)", records.len(), headers.len());

    if let [header] = headers.as_slice() {
        // The writer would quote a lone empty field as `""`
        let mut lines = vec![render_rows(std::iter::once(vec![header.clone()]))?];
        for record in records {
            let cell = cell_text(record, header);
            if cell.is_empty() {
                lines.push(String::new());
            } else {
                lines.push(render_rows(std::iter::once(vec![cell]))?);
            }
        }
        return Ok(lines.join("\n"));
    }

    let rows = records
        .iter()
        .map(|record| headers.iter().map(|h| cell_text(record, h)).collect::<Vec<_>>());
    render_rows(std::iter::once(headers.clone()).chain(rows))
}

fn render_rows(rows: impl IntoIterator<Item = Vec<String>>) -> BurpResult<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| BurpError::export(format!("failed to flush CSV writer: {}", e)))?;
    let mut content = String::from_utf8(bytes)
        .map_err(|e| BurpError::export(format!("CSV output is not UTF-8: {}", e)))?;

    if content.ends_with('\n') {
        content.pop();
    }
    Ok(content)
}
