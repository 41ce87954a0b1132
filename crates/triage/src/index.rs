//! Thread index for one run
//!
//! Built by reading the threads table once at run start; read-only for the
//! remainder of the run. All row mutations are deferred to the aggregator
//! so a run never issues more than one read pass and one write pass.

use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;

use crate::models::{ThreadId, ThreadRecord};
use crate::table::{TableStore, tables};

/// A tracked thread and the row it occupied when the index was built
pub struct IndexedThread {
    /// 0-based data-row position at load time. Stale once new rows have
    /// been inserted; the aggregator re-resolves positions at commit.
    pub position: usize,
    pub record: ThreadRecord,
}

/// Mapping from thread id to its existing row
pub struct ThreadIndex {
    entries: HashMap<String, IndexedThread>,
}

impl ThreadIndex {
    /// Build the index by reading the threads table in full
    pub fn load(table: &dyn TableStore) -> Result<Self> {
        let rows = table
            .read_all(tables::THREADS)
            .context("Failed to read threads table")?;

        let mut entries = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            match ThreadRecord::from_row(row) {
                Ok(record) => {
                    let id = record.thread_id.0.clone();
                    if entries
                        .insert(id.clone(), IndexedThread { position, record })
                        .is_some()
                    {
                        // Should never happen; the dedup invariant keeps
                        // one row per thread id
                        warn!("duplicate row for thread {} at position {}", id, position);
                    }
                }
                Err(e) => {
                    warn!("skipping unreadable threads row {}: {:#}", position, e);
                }
            }
        }

        Ok(Self { entries })
    }

    /// An empty index (tests)
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up a thread's existing row
    pub fn lookup(&self, id: &ThreadId) -> Option<&IndexedThread> {
        self.entries.get(id.as_str())
    }

    /// Number of tracked threads
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::columns;
    use crate::table::InMemoryTableStore;
    use chrono::Utc;

    fn sample_row(thread_id: &str) -> Vec<String> {
        let mut row = vec![String::new(); columns::WIDTH];
        row[columns::THREAD_ID] = thread_id.to_string();
        row[columns::FIRST_MESSAGE_ID] = format!("msg-{}", thread_id);
        row[columns::CREATED_AT] = Utc::now().to_rfc3339();
        row[columns::SENDER_EMAIL] = "a@x.com".to_string();
        row
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let table = InMemoryTableStore::new();
        table.append_row(tables::THREADS, sample_row("thr_1")).unwrap();
        table.append_row(tables::THREADS, sample_row("thr_2")).unwrap();

        let index = ThreadIndex::load(&table).unwrap();
        assert_eq!(index.len(), 2);

        let hit = index.lookup(&ThreadId::new("thr_2")).unwrap();
        assert_eq!(hit.position, 1);
        assert_eq!(hit.record.thread_id, ThreadId::new("thr_2"));

        assert!(index.lookup(&ThreadId::new("thr_404")).is_none());
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let table = InMemoryTableStore::new();
        table.append_row(tables::THREADS, vec!["short".to_string()]).unwrap();
        table.append_row(tables::THREADS, sample_row("thr_ok")).unwrap();

        let index = ThreadIndex::load(&table).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.lookup(&ThreadId::new("thr_ok")).is_some());
    }

    #[test]
    fn test_empty_table() {
        let table = InMemoryTableStore::new();
        let index = ThreadIndex::load(&table).unwrap();
        assert!(index.is_empty());
    }
}
