//! SQLite-backed table storage
//!
//! Rows are stored as JSON-encoded cell lists keyed by (table, position),
//! with positions kept contiguous from 0 so the sheet-like position
//! semantics of [`TableStore`] map directly onto the schema.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{Row, TableStore, cell_at, compare_cells};

/// Database migrations
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: initial schema
        M::up(
            r#"
            CREATE TABLE rows (
                tbl TEXT NOT NULL,
                position INTEGER NOT NULL,
                cells TEXT NOT NULL,  -- JSON array of strings
                PRIMARY KEY (tbl, position)
            );

            CREATE INDEX idx_rows_tbl ON rows(tbl);
            "#,
        ),
    ])
}

/// SQLite implementation of [`TableStore`]
pub struct SqliteTableStore {
    conn: Mutex<Connection>,
}

impl SqliteTableStore {
    /// Open (or create) a table store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {}", path.as_ref().display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL journal mode")?;
        migrations()
            .to_latest(&mut conn)
            .context("Failed to apply database migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrations().to_latest(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM rows WHERE tbl = ?1",
            params![table],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }
}

fn encode(row: &Row) -> Result<String> {
    serde_json::to_string(row).context("Failed to encode row")
}

fn decode(cells: &str) -> Result<Row> {
    serde_json::from_str(cells).context("Failed to decode row")
}

impl TableStore for SqliteTableStore {
    fn read_all(&self, table: &str) -> Result<Vec<Row>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT cells FROM rows WHERE tbl = ?1 ORDER BY position ASC")?;
        let rows = stmt
            .query_map(params![table], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter().map(|cells| decode(cells)).collect()
    }

    fn insert_rows_before(&self, table: &str, position: usize, rows: Vec<Row>) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let count = Self::count_rows(&tx, table)?;
        if position > count {
            bail!(
                "insert position {} out of bounds for table '{}' ({} rows)",
                position,
                table,
                count
            );
        }

        // Shift later rows down. The sign flip avoids transient primary
        // key collisions while positions move.
        let shift = rows.len() as i64;
        tx.execute(
            "UPDATE rows SET position = -(position + ?1) WHERE tbl = ?2 AND position >= ?3",
            params![shift, table, position as i64],
        )?;
        tx.execute(
            "UPDATE rows SET position = -position WHERE tbl = ?1 AND position < 0",
            params![table],
        )?;

        for (offset, row) in rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO rows (tbl, position, cells) VALUES (?1, ?2, ?3)",
                params![table, (position + offset) as i64, encode(row)?],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn set_cell(&self, table: &str, row: usize, col: usize, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let cells: Option<String> = conn
            .query_row(
                "SELECT cells FROM rows WHERE tbl = ?1 AND position = ?2",
                params![table, row as i64],
                |r| r.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some(cells) = cells else {
            bail!("row {} does not exist in table '{}'", row, table);
        };

        let mut decoded = decode(&cells)?;
        if col >= decoded.len() {
            decoded.resize(col + 1, String::new());
        }
        decoded[col] = value.to_string();

        conn.execute(
            "UPDATE rows SET cells = ?1 WHERE tbl = ?2 AND position = ?3",
            params![encode(&decoded)?, table, row as i64],
        )?;
        Ok(())
    }

    fn append_row(&self, table: &str, row: Row) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let count = Self::count_rows(&conn, table)?;
        conn.execute(
            "INSERT INTO rows (tbl, position, cells) VALUES (?1, ?2, ?3)",
            params![table, count as i64, encode(&row)?],
        )?;
        Ok(())
    }

    fn sort_by(&self, table: &str, col: usize, descending: bool) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let mut rows = {
            let mut stmt =
                tx.prepare("SELECT cells FROM rows WHERE tbl = ?1 ORDER BY position ASC")?;
            let raw = stmt
                .query_map(params![table], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.iter().map(|c| decode(c)).collect::<Result<Vec<_>>>()?
        };

        rows.sort_by(|a, b| {
            let ord = compare_cells(cell_at(a, col), cell_at(b, col));
            if descending { ord.reverse() } else { ord }
        });

        tx.execute("DELETE FROM rows WHERE tbl = ?1", params![table])?;
        for (position, row) in rows.iter().enumerate() {
            tx.execute(
                "INSERT INTO rows (tbl, position, cells) VALUES (?1, ?2, ?3)",
                params![table, position as i64, encode(row)?],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}
