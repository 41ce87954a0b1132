//! Table storage trait definition

use anyhow::Result;

/// One data row: an ordered list of string cells
pub type Row = Vec<String>;

/// Trait for sheet-like table storage
///
/// Positions are 0-based data-row indices; the header row of the original
/// sheet surface is not represented here, so "insert immediately after the
/// header" is an insert before position 0.
pub trait TableStore: Send + Sync {
    /// Read every data row of a table, in order. A table that was never
    /// written reads as empty.
    fn read_all(&self, table: &str) -> Result<Vec<Row>>;

    /// Insert rows before `position`, shifting later rows down
    fn insert_rows_before(&self, table: &str, position: usize, rows: Vec<Row>) -> Result<()>;

    /// Overwrite a single cell of an existing row
    fn set_cell(&self, table: &str, row: usize, col: usize, value: &str) -> Result<()>;

    /// Append a row at the end of a table
    fn append_row(&self, table: &str, row: Row) -> Result<()>;

    /// Re-order the whole table by one column
    ///
    /// Cells that parse as numbers compare numerically, everything else
    /// lexicographically (RFC3339 timestamps sort correctly either way).
    fn sort_by(&self, table: &str, col: usize, descending: bool) -> Result<()>;
}

/// Comparison used by `sort_by` implementations
pub(crate) fn compare_cells(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// The cell a row presents at `col`, empty when the row is short
pub(crate) fn cell_at(row: &Row, col: usize) -> &str {
    row.get(col).map(String::as_str).unwrap_or("")
}
