//! Run aggregator
//!
//! Collects every outcome produced during one run — new rows, targeted
//! auto-response updates, and matched compensation substrings — and
//! commits them back to the table store in as few batch operations as
//! possible: one bulk insert after the header, one re-sort by date, then
//! the targeted cell writes.

use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;

use crate::models::{ThreadId, ThreadRecord, columns};
use crate::table::{TableStore, tables};

/// A deferred auto-response cell write
struct RowUpdate {
    thread_id: ThreadId,
    /// Position at index-load time; only a fallback, commit re-resolves
    /// by thread id because the insert and sort shift rows
    position: usize,
    recipients: Vec<String>,
}

/// Accumulates one run's table mutations
#[derive(Default)]
pub struct RunAggregator {
    new_records: Vec<ThreadRecord>,
    updates: Vec<RowUpdate>,
    compensation: Vec<String>,
}

impl RunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new row, in scan order
    pub fn push_insert(&mut self, record: ThreadRecord) {
        if let Some(span) = &record.compensation {
            self.compensation.push(span.clone());
        }
        self.new_records.push(record);
    }

    /// Queue a targeted auto-response update for an existing row
    pub fn push_update(&mut self, thread_id: ThreadId, position: usize, recipients: Vec<String>) {
        self.updates.push(RowUpdate {
            thread_id,
            position,
            recipients,
        });
    }

    pub fn inserted(&self) -> usize {
        self.new_records.len()
    }

    pub fn updated(&self) -> usize {
        self.updates.len()
    }

    /// Matched compensation substrings with their occurrence counts
    pub fn compensation_summary(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for span in &self.compensation {
            *counts.entry(span).or_insert(0) += 1;
        }
        let mut summary: Vec<_> = counts
            .into_iter()
            .map(|(span, n)| (span.to_string(), n))
            .collect();
        summary.sort();
        summary
    }

    /// Commit all accumulated mutations.
    ///
    /// Partial failures are not rolled back; re-running the scan is
    /// idempotent under the dedup invariant and the next run reconciles.
    pub fn commit(&self, table: &dyn TableStore) -> Result<()> {
        if !self.new_records.is_empty() {
            let rows = self.new_records.iter().map(ThreadRecord::to_row).collect();
            table
                .insert_rows_before(tables::THREADS, 0, rows)
                .context("Failed to insert new thread rows")?;
            table
                .sort_by(tables::THREADS, columns::CREATED_AT, true)
                .context("Failed to sort threads table")?;
            info!("inserted {} new thread rows", self.new_records.len());
        }

        if !self.updates.is_empty() {
            let positions = self.resolve_positions(table)?;
            for update in &self.updates {
                let row = positions
                    .get(update.thread_id.as_str())
                    .copied()
                    .unwrap_or(update.position);
                table
                    .set_cell(
                        tables::THREADS,
                        row,
                        columns::AUTO_RESPONSE,
                        &ThreadRecord::auto_response_cell(&update.recipients),
                    )
                    .with_context(|| {
                        format!("Failed to update thread {}", update.thread_id.as_str())
                    })?;
            }
            info!("updated {} existing thread rows", self.updates.len());
        }

        Ok(())
    }

    /// Current row position per thread id.
    ///
    /// Update positions recorded at scan time go stale once the bulk
    /// insert and re-sort have shifted rows, so cell writes re-resolve
    /// their target against the committed table.
    fn resolve_positions(&self, table: &dyn TableStore) -> Result<HashMap<String, usize>> {
        let rows = table
            .read_all(tables::THREADS)
            .context("Failed to re-read threads table")?;
        Ok(rows
            .iter()
            .enumerate()
            .filter_map(|(pos, row)| {
                row.get(columns::THREAD_ID)
                    .map(|id| (id.clone(), pos))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::InMemoryTableStore;
    use chrono::{TimeZone, Utc};

    fn record(thread_id: &str, day: u32) -> ThreadRecord {
        ThreadRecord {
            thread_id: ThreadId::new(thread_id),
            first_message_id: format!("msg-{}", thread_id),
            created_at: Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap(),
            sender_email: "a@x.com".to_string(),
            reply_to: String::new(),
            person_name: "A".to_string(),
            subject: "Subject".to_string(),
            body_emails: Vec::new(),
            body: "body".to_string(),
            compensation: None,
            permalink: String::new(),
            auto_response: None,
        }
    }

    #[test]
    fn test_inserts_land_sorted_by_date_descending() {
        let table = InMemoryTableStore::new();
        table
            .append_row(tables::THREADS, record("old", 10).to_row())
            .unwrap();

        let mut agg = RunAggregator::new();
        agg.push_insert(record("newer", 20));
        agg.push_insert(record("newest", 25));
        agg.commit(&table).unwrap();

        let ids: Vec<_> = table
            .read_all(tables::THREADS)
            .unwrap()
            .iter()
            .map(|r| r[columns::THREAD_ID].clone())
            .collect();
        assert_eq!(ids, vec!["newest", "newer", "old"]);
    }

    #[test]
    fn test_update_targets_row_after_resort() {
        let table = InMemoryTableStore::new();
        // "old" sits at position 0 before the run
        table
            .append_row(tables::THREADS, record("old", 10).to_row())
            .unwrap();

        let mut agg = RunAggregator::new();
        // Insert a newer row; after the sort "old" moves to position 1
        agg.push_insert(record("newer", 20));
        agg.push_update(
            ThreadId::new("old"),
            0,
            vec!["a@x.com".to_string(), "b@x.com".to_string()],
        );
        agg.commit(&table).unwrap();

        let rows = table.read_all(tables::THREADS).unwrap();
        assert_eq!(rows[0][columns::THREAD_ID], "newer");
        assert_eq!(rows[0][columns::AUTO_RESPONSE], "");
        assert_eq!(rows[1][columns::THREAD_ID], "old");
        assert_eq!(rows[1][columns::AUTO_RESPONSE], "a@x.com;b@x.com");
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let table = InMemoryTableStore::new();
        RunAggregator::new().commit(&table).unwrap();
        assert!(table.read_all(tables::THREADS).unwrap().is_empty());
    }

    #[test]
    fn test_compensation_summary_is_a_multiset() {
        let mut agg = RunAggregator::new();
        let mut a = record("t1", 1);
        a.compensation = Some("$150-180".to_string());
        let mut b = record("t2", 2);
        b.compensation = Some("$150-180".to_string());
        let mut c = record("t3", 3);
        c.compensation = Some("200k".to_string());
        agg.push_insert(a);
        agg.push_insert(b);
        agg.push_insert(c);

        assert_eq!(
            agg.compensation_summary(),
            vec![("$150-180".to_string(), 2), ("200k".to_string(), 1)]
        );
    }
}
