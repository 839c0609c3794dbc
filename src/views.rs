//! Text renderings of a scrape result: raw JSON, formatted cards and the
//! interactive table.

use serde_json::Value;
use std::fmt::Write;

use crate::api::ScrapeResult;
use crate::error::BurpResult;
use crate::export::to_json;
use crate::record::{value_to_text, RecordView};
use crate::table::TableView;

/// Widest a table cell is drawn before truncation
pub const MAX_CELL_WIDTH: usize = 32;

/// Pretty JSON of the whole result
pub fn render_json(result: &ScrapeResult) -> BurpResult<String> {
    to_json(&result.to_value())
}

/// Summary counters followed by the first `limit` records as cards
pub fn render_formatted(result: &ScrapeResult, limit: usize) -> String {
    let mut out = String::new();

    let mut header = Vec::new();
    if let Some(term) = &result.search_term {
        header.push(format!("Search: {}", term));
    }
    if let Some(scraper) = &result.scraper_used {
        header.push(format!("Scraper: {}", scraper));
    }
    if let Some(timestamp) = result
        .timestamp
        .as_deref()
        .or_else(|| result.extra.get("execution_timestamp").and_then(Value::as_str))
    {
        header.push(format!("Time: {}", timestamp));
    }
    if !header.is_empty() {
        let _ = writeln!(out, "{}", header.join(" | "));
    }

    let summary = &result.summary;
    let discounts = summary
        .products_with_discounts
        .or_else(|| summary.extra.get("products_with_deals").and_then(Value::as_u64))
        .unwrap_or(0);
    let _ = writeln!(
        out,
        "Total Products: {}  With Price: {}  With Rating: {}  With Discounts: {}",
        summary.total_products.unwrap_or(result.products.len() as u64),
        summary.products_with_price.unwrap_or(0),
        summary.products_with_rating.unwrap_or(0),
        discounts
    );

    if let Some(range) = summary.extra.get("price_range") {
        let min = range.get("min_price").map(value_to_text).unwrap_or_default();
        let max = range.get("max_price").map(value_to_text).unwrap_or_default();
        let _ = writeln!(out, "Price Range: ₹{} - ₹{}", min, max);
    }

    if result.products.is_empty() {
        let _ = writeln!(out, "\nNo records found.");
        return out;
    }

    for (index, record) in result.products.iter().take(limit).enumerate() {
        let _ = writeln!(out);
        render_card(&mut out, index + 1, &RecordView::new(record));
    }

    if result.products.len() > limit {
        let _ = writeln!(out, "\nShowing first {} of {}", limit, result.products.len());
    }

    out
}

fn render_card(out: &mut String, number: usize, view: &RecordView<'_>) {
    let title = view.title().unwrap_or_else(|| "Untitled".to_string());
    let _ = writeln!(out, "[{}] {}", number, title);

    let mut byline = Vec::new();
    if let Some(brand) = view.brand() {
        byline.push(format!("Brand: {}", brand));
    }
    if let Some(creator) = view.creator() {
        byline.push(format!("Creator: {}", creator));
    }
    if let Some(duration) = view.duration() {
        byline.push(format!("Duration: {}", duration));
    }
    if !byline.is_empty() {
        let _ = writeln!(out, "    {}", byline.join(" | "));
    }

    if let Some(snippet) = view.snippet() {
        let _ = writeln!(out, "    {}", truncate(&snippet, 160));
    }

    let mut facts = Vec::new();
    if let Some(price) = view.price() {
        let mut text = format!("Price: {}", price);
        if let Some(original) = view.original_price() {
            text.push_str(&format!(" (was {})", original));
        }
        if let Some(discount) = view.discount() {
            text.push_str(&format!(" {} off", discount));
        }
        facts.push(text);
    }
    if let Some(rating) = view.rating() {
        facts.push(format!("Rating: {}", rating));
    }
    if let Some(likes) = view.like_count() {
        facts.push(format!("Likes: {}", likes));
    }
    if let Some(date) = view.upload_date() {
        facts.push(format!("Uploaded: {}", date));
    }
    if !facts.is_empty() {
        let _ = writeln!(out, "    {}", facts.join(" | "));
    }

    if let Some(link) = view.link() {
        let _ = writeln!(out, "    {}: {}", view.link_label(), link);
    }
}

/// Current page of the table with selection marks, sort arrow and footer
pub fn render_table(view: &TableView) -> String {
    let mut out = String::new();

    if view.headers().is_empty() {
        let _ = writeln!(out, "No data available for table view");
        return out;
    }

    let headers: Vec<String> = view
        .headers()
        .iter()
        .map(|h| match view.sort() {
            Some(sort) if &sort.column == h => format!("{} {}", h, sort.direction.arrow()),
            _ => h.clone(),
        })
        .collect();

    let rows = view.current_page_rows();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }
    for width in widths.iter_mut() {
        *width = (*width).min(MAX_CELL_WIDTH);
    }

    let header_line: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| pad(&truncate(h, w), w))
        .collect();
    let _ = writeln!(out, "    #   | {}", header_line.join(" | "));
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let _ = writeln!(out, "--------+-{}", rule.join("-+-"));

    let offset = view.page().saturating_sub(1).saturating_mul(view.page_size());
    for (local, row) in rows.iter().enumerate() {
        let mark = if view.is_selected(local) { "[x]" } else { "[ ]" };
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| pad(&truncate(&single_line(cell), w), w))
            .collect();
        let _ = writeln!(out, "{} {:>4} | {}", mark, offset + local + 1, cells.join(" | "));
    }

    let _ = writeln!(out);
    let mut footer = view.showing_text();
    if view.total_rows() != view.visible_rows().len() {
        footer.push_str(&format!(" (filtered from {} total)", view.total_rows()));
    }
    if view.selected_count() > 0 {
        footer.push_str(&format!(" | {} selected", view.selected_count()));
    }
    let _ = writeln!(out, "{}", footer);

    let pages = view.pager_window();
    if pages.len() > 1 {
        let labels: Vec<String> = pages
            .iter()
            .map(|&p| if p == view.page() { format!("[{}]", p) } else { p.to_string() })
            .collect();
        let _ = writeln!(out, "Pages: {} of {}", labels.join(" "), view.total_pages());
    }

    out
}

fn display_width(text: &str) -> usize {
    text.chars().count()
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r', '\t'], " ")
}

fn truncate(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn pad(text: &str, width: usize) -> String {
    let len = display_width(text);
    if len >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{flatten_all, to_table};
    use serde_json::json;

    fn result(count: usize) -> ScrapeResult {
        let products: Vec<Value> = (0..count)
            .map(|i| json!({"name": format!("Product {}", i), "price": format!("₹{}", 100 + i), "url": "https://example.com"}))
            .collect();
        ScrapeResult::from_value(json!({
            "search_term": "laptop",
            "scraper_used": "Amazon",
            "summary": {"total_products": count, "products_with_deals": 2},
            "products": products
        }))
    }

    #[test]
    fn test_formatted_view_limits_cards() {
        let text = render_formatted(&result(25), 20);

        assert!(text.starts_with("Search: laptop | Scraper: Amazon"));
        assert!(text.contains("Total Products: 25"));
        assert!(text.contains("With Discounts: 2"));
        assert!(text.contains("[20] Product 19"));
        assert!(!text.contains("[21]"));
        assert!(text.contains("View Page: https://example.com"));
        assert!(text.trim_end().ends_with("Showing first 20 of 25"));
    }

    #[test]
    fn test_formatted_view_cards_for_videos() {
        let video = ScrapeResult::from_value(json!({
            "products": [{"youtube_url": "https://youtu.be/x", "creator_name": "chan", "duration": 75, "like_count": 9}]
        }));
        let text = render_formatted(&video, 20);

        assert!(text.contains("[1] https://youtu.be/x"));
        assert!(text.contains("Creator: chan | Duration: 1:15"));
        assert!(text.contains("Likes: 9"));
        assert!(text.contains("Watch Video: https://youtu.be/x"));
        assert!(!text.contains("Showing first"));
    }

    #[test]
    fn test_table_rendering() {
        let result = result(12);
        let mut view = TableView::new(to_table(&flatten_all(&result.products)), 5);
        view.sort_by("name");
        view.set_page(2);
        view.toggle_row(0);

        let text = render_table(&view);
        assert!(text.contains("name ↑"));
        assert!(text.contains("[x]    6 | Product 3"));
        assert!(text.contains("Showing 6 to 10 of 12 entries | 1 selected"));
        assert!(text.contains("Pages: 1 [2] 3 of 3"));
    }

    #[test]
    fn test_table_rendering_past_last_page() {
        let result = result(12);
        let mut view = TableView::new(to_table(&flatten_all(&result.products)), 5);
        view.set_page(usize::MAX);
        view.toggle_row(0);

        let text = render_table(&view);
        assert!(text.contains("Showing 0 to 0 of 12 entries"));
        assert!(!text.contains("[x]"));
    }

    #[test]
    fn test_json_view_round_trips() {
        let result = ScrapeResult::from_value(json!({
            "search_term": null,
            "products": [{"name": "Product 0", "price": null}]
        }));
        let text = render_json(&result).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, result.to_value());
        assert!(parsed.get("summary").is_none());
        assert_eq!(parsed["search_term"], Value::Null);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
