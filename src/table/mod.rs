//! Record flattening and the interactive table: header/row matrix, search,
//! numeric-aware sort, pagination and row selection.

pub mod flatten;
pub mod matrix;
pub mod view;

pub use flatten::{flatten, flatten_all, FlatRecord, ARRAY_SEPARATOR};
pub use matrix::{
    compare_cells, filter_rows, header_union, paginate, parse_float_prefix, sort_rows, to_table,
    total_pages, SortDirection, TableMatrix,
};
pub use view::{SortKey, TableView};
