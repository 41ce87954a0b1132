//! In-memory table storage
//!
//! Used for tests and as a scratch backend; every run rebuilds its state
//! from the table contents, so the implementation is a plain map of named
//! row lists behind an RwLock.

use anyhow::{Result, bail};
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{Row, TableStore, cell_at, compare_cells};

/// In-memory implementation of [`TableStore`]
pub struct InMemoryTableStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl InMemoryTableStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of data rows in a table
    pub fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().unwrap();
        tables.get(table).map(Vec::len).unwrap_or(0)
    }
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for InMemoryTableStore {
    fn read_all(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self.tables.read().unwrap();
        Ok(tables.get(table).cloned().unwrap_or_default())
    }

    fn insert_rows_before(&self, table: &str, position: usize, rows: Vec<Row>) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        let existing = tables.entry(table.to_string()).or_default();
        if position > existing.len() {
            bail!(
                "insert position {} out of bounds for table '{}' ({} rows)",
                position,
                table,
                existing.len()
            );
        }
        existing.splice(position..position, rows);
        Ok(())
    }

    fn set_cell(&self, table: &str, row: usize, col: usize, value: &str) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        let rows = tables
            .get_mut(table)
            .filter(|rows| row < rows.len())
            .map(|rows| &mut rows[row]);
        let Some(target) = rows else {
            bail!("row {} does not exist in table '{}'", row, table);
        };
        if col >= target.len() {
            target.resize(col + 1, String::new());
        }
        target[col] = value.to_string();
        Ok(())
    }

    fn append_row(&self, table: &str, row: Row) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        tables.entry(table.to_string()).or_default().push(row);
        Ok(())
    }

    fn sort_by(&self, table: &str, col: usize, descending: bool) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            rows.sort_by(|a, b| {
                let ord = compare_cells(cell_at(a, col), cell_at(b, col));
                if descending { ord.reverse() } else { ord }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_read_missing_table_is_empty() {
        let store = InMemoryTableStore::new();
        assert!(store.read_all("nope").unwrap().is_empty());
    }

    #[test]
    fn test_insert_before_zero_prepends() {
        let store = InMemoryTableStore::new();
        store.append_row("t", row(&["old"])).unwrap();
        store
            .insert_rows_before("t", 0, vec![row(&["new1"]), row(&["new2"])])
            .unwrap();
        let rows = store.read_all("t").unwrap();
        assert_eq!(rows, vec![row(&["new1"]), row(&["new2"]), row(&["old"])]);
    }

    #[test]
    fn test_insert_out_of_bounds_fails() {
        let store = InMemoryTableStore::new();
        assert!(store.insert_rows_before("t", 1, vec![row(&["x"])]).is_err());
    }

    #[test]
    fn test_set_cell() {
        let store = InMemoryTableStore::new();
        store.append_row("t", row(&["a", "b"])).unwrap();
        store.set_cell("t", 0, 1, "changed").unwrap();
        assert_eq!(store.read_all("t").unwrap()[0], row(&["a", "changed"]));
    }

    #[test]
    fn test_set_cell_extends_short_row() {
        let store = InMemoryTableStore::new();
        store.append_row("t", row(&["a"])).unwrap();
        store.set_cell("t", 0, 3, "x").unwrap();
        assert_eq!(store.read_all("t").unwrap()[0], row(&["a", "", "", "x"]));
    }

    #[test]
    fn test_set_cell_missing_row_fails() {
        let store = InMemoryTableStore::new();
        assert!(store.set_cell("t", 0, 0, "x").is_err());
    }

    #[test]
    fn test_sort_descending_by_timestamp() {
        let store = InMemoryTableStore::new();
        store.append_row("t", row(&["a", "2025-01-01T00:00:00+00:00"])).unwrap();
        store.append_row("t", row(&["b", "2025-03-01T00:00:00+00:00"])).unwrap();
        store.append_row("t", row(&["c", "2025-02-01T00:00:00+00:00"])).unwrap();
        store.sort_by("t", 1, true).unwrap();
        let ids: Vec<_> = store.read_all("t").unwrap().iter().map(|r| r[0].clone()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_numeric() {
        let store = InMemoryTableStore::new();
        store.append_row("t", row(&["@a.com", "10"])).unwrap();
        store.append_row("t", row(&["@b.com", "2"])).unwrap();
        store.sort_by("t", 1, false).unwrap();
        let rows = store.read_all("t").unwrap();
        assert_eq!(rows[0][1], "2");
        assert_eq!(rows[1][1], "10");
    }
}
