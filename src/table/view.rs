use serde_json::{Map, Value};
use std::collections::BTreeSet;

use super::matrix::{filter_rows, paginate, sort_rows, total_pages, SortDirection, TableMatrix};

/// Active sort: column header plus direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

/// Interactive table state over one result set.
///
/// Holds the search query, sort, page and selection. The visible row set
/// (filtered, then sorted) is recomputed whenever query or sort change;
/// selection indices point into that set, so they are cleared at the same
/// time.
#[derive(Debug, Clone)]
pub struct TableView {
    matrix: TableMatrix,
    visible: Vec<Vec<String>>,
    query: String,
    sort: Option<SortKey>,
    page: usize,
    page_size: usize,
    selected: BTreeSet<usize>,
}

impl TableView {
    pub fn new(matrix: TableMatrix, page_size: usize) -> Self {
        let visible = matrix.rows.clone();
        Self {
            matrix,
            visible,
            query: String::new(),
            sort: None,
            page: 1,
            page_size,
            selected: BTreeSet::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.matrix.headers
    }

    pub fn matrix(&self) -> &TableMatrix {
        &self.matrix
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort(&self) -> Option<&SortKey> {
        self.sort.as_ref()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows after filtering and sorting
    pub fn visible_rows(&self) -> &[Vec<String>] {
        &self.visible
    }

    pub fn total_rows(&self) -> usize {
        self.matrix.rows.len()
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.visible.len(), self.page_size)
    }

    pub fn current_page_rows(&self) -> &[Vec<String>] {
        paginate(&self.visible, self.page, self.page_size)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.query {
            return;
        }
        self.query = query;
        self.page = 1;
        self.refresh();
    }

    /// Sort by header. Clicking the active column flips direction; a new
    /// column starts ascending. Unknown headers are ignored.
    pub fn sort_by(&mut self, column: &str) {
        if self.matrix.column_index(column).is_none() {
            return;
        }

        let direction = match &self.sort {
            Some(current) if current.column == column => current.direction.toggled(),
            _ => SortDirection::Asc,
        };
        self.set_sort(column, direction);
    }

    pub fn set_sort(&mut self, column: &str, direction: SortDirection) {
        if self.matrix.column_index(column).is_none() {
            return;
        }
        self.sort = Some(SortKey {
            column: column.to_string(),
            direction,
        });
        self.refresh();
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
        self.page = 1;
    }

    pub fn next_page(&mut self) {
        if self.page < self.total_pages() {
            self.page += 1;
        }
    }

    pub fn previous_page(&mut self) {
        if self.page > 1 {
            self.page -= 1;
        }
    }

    fn refresh(&mut self) {
        let mut rows = filter_rows(&self.matrix.rows, &self.query);
        if let Some(sort) = &self.sort {
            if let Some(column) = self.matrix.column_index(&sort.column) {
                sort_rows(&mut rows, column, sort.direction);
            }
        }
        self.visible = rows;
        self.selected.clear();
    }

    /// `None` when the page lies beyond any addressable row
    fn global_index(&self, local: usize) -> Option<usize> {
        self.page
            .saturating_sub(1)
            .checked_mul(self.page_size)?
            .checked_add(local)
    }

    /// Toggle a row by its position on the current page
    pub fn toggle_row(&mut self, local: usize) {
        let Some(index) = self.global_index(local) else {
            return;
        };
        if index >= self.visible.len() || local >= self.page_size {
            return;
        }
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
    }

    pub fn is_selected(&self, local: usize) -> bool {
        self.global_index(local)
            .map_or(false, |index| self.selected.contains(&index))
    }

    /// Select every row of the current page, or clear them if all are
    /// already selected
    pub fn toggle_select_page(&mut self) {
        let count = self.current_page_rows().len();
        if count == 0 {
            return;
        }
        let indices: Vec<usize> = (0..count).filter_map(|i| self.global_index(i)).collect();

        if indices.iter().all(|i| self.selected.contains(i)) {
            for index in indices {
                self.selected.remove(&index);
            }
        } else {
            self.selected.extend(indices);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Selected rows in visible order
    pub fn selected_rows(&self) -> Vec<&Vec<String>> {
        self.selected
            .iter()
            .filter_map(|&i| self.visible.get(i))
            .collect()
    }

    /// Visible rows as `header → cell` records
    pub fn all_records(&self) -> Vec<Map<String, Value>> {
        self.matrix.rows_to_records(&self.visible)
    }

    pub fn selected_records(&self) -> Vec<Map<String, Value>> {
        self.matrix.rows_to_records(self.selected_rows())
    }

    /// "Showing A to B of N entries"
    pub fn showing_text(&self) -> String {
        let total = self.visible.len();
        let shown = self.current_page_rows().len();
        if shown == 0 {
            return format!("Showing 0 to 0 of {} entries", total);
        }
        let start = self.global_index(0).unwrap_or(0) + 1;
        format!("Showing {} to {} of {} entries", start, start + shown - 1, total)
    }

    /// Up to five page numbers starting two before the current page
    pub fn pager_window(&self) -> Vec<usize> {
        let total = self.total_pages();
        let first = self.page.saturating_sub(2).max(1);
        (first..first.saturating_add(5)).filter(|&p| p <= total).collect()
    }
}
