//! Suppression state for one run
//!
//! Rebuilt from the tracking tables at the start of every run: the
//! track-exclusion patterns (senders never to process) and the cumulative
//! autoresponse counts per domain. Counter increments accumulate in a
//! transient delta map and are merged into the persisted table exactly
//! once at end-of-run.

use anyhow::{Context, Result};
use log::warn;
use regex::Regex;
use std::collections::HashMap;

use crate::table::{TableStore, tables};

/// Column layout of the domain-responses table
mod columns {
    pub const DOMAIN: usize = 0;
    pub const COUNT: usize = 1;
}

/// One exclusion pattern
///
/// A sender matches when the pattern equals its address or domain exactly
/// (case-insensitive), or when the pattern compiles as a regex matching
/// the raw From header. Patterns that fail to compile still participate
/// in exact matching.
struct ExclusionPattern {
    raw: String,
    regex: Option<Regex>,
}

impl ExclusionPattern {
    fn new(raw: &str) -> Self {
        let regex = match Regex::new(raw) {
            Ok(re) => Some(re),
            Err(_) => {
                warn!("exclusion pattern '{}' is not a valid regex; exact matching only", raw);
                None
            }
        };
        Self {
            raw: raw.to_lowercase(),
            regex,
        }
    }

    fn matches(&self, sender_email: &str, domain: &str, from_raw: &str) -> bool {
        if !sender_email.is_empty() && self.raw == sender_email.to_lowercase() {
            return true;
        }
        if !domain.is_empty() && self.raw == domain {
            return true;
        }
        self.regex
            .as_ref()
            .is_some_and(|re| re.is_match(from_raw))
    }
}

/// A persisted counter and where its row lives
struct PersistedCount {
    count: u64,
    row: usize,
}

/// Per-run suppression state
pub struct SuppressionStore {
    exclusions: Vec<ExclusionPattern>,
    counts: HashMap<String, PersistedCount>,
    /// Rows appended during drain land after the last loaded row
    next_row: usize,
    /// This run's increments, not yet persisted
    delta: HashMap<String, u64>,
}

impl SuppressionStore {
    /// Rebuild suppression state by reading both tables in full
    pub fn load(table: &dyn TableStore) -> Result<Self> {
        let exclusions = table
            .read_all(tables::TRACK_EXCLUSIONS)
            .context("Failed to read track exclusions")?
            .iter()
            .filter_map(|row| row.first())
            .filter(|cell| !cell.trim().is_empty())
            .map(|cell| ExclusionPattern::new(cell.trim()))
            .collect();

        let rows = table
            .read_all(tables::DOMAIN_RESPONSES)
            .context("Failed to read domain response counts")?;

        let mut counts = HashMap::new();
        for (position, row) in rows.iter().enumerate() {
            let Some(domain) = row.get(columns::DOMAIN) else {
                continue;
            };
            let count = row
                .get(columns::COUNT)
                .and_then(|cell| cell.parse::<u64>().ok())
                .unwrap_or_else(|| {
                    warn!("unparseable response count for '{}', treating as 0", domain);
                    0
                });
            counts.insert(
                domain.to_lowercase(),
                PersistedCount {
                    count,
                    row: position,
                },
            );
        }

        Ok(Self {
            exclusions,
            next_row: rows.len(),
            counts,
            delta: HashMap::new(),
        })
    }

    /// An empty store, for tests and dry runs
    pub fn empty() -> Self {
        Self {
            exclusions: Vec::new(),
            counts: HashMap::new(),
            next_row: 0,
            delta: HashMap::new(),
        }
    }

    /// Add an exclusion pattern to the in-memory set (tests)
    #[cfg(test)]
    pub(crate) fn add_exclusion(&mut self, pattern: &str) {
        self.exclusions.push(ExclusionPattern::new(pattern));
    }

    /// Whether a sender matches any track-exclusion entry
    pub fn is_excluded(&self, sender_email: &str, domain: &str, from_raw: &str) -> bool {
        self.exclusions
            .iter()
            .any(|p| p.matches(sender_email, domain, from_raw))
    }

    /// Autoresponse count for a domain, persisted plus this run's delta
    pub fn response_count(&self, domain: &str) -> Option<u64> {
        let domain = domain.to_lowercase();
        let persisted = self.counts.get(&domain).map(|c| c.count);
        let pending = self.delta.get(&domain).copied();
        match (persisted, pending) {
            (None, None) => None,
            (p, d) => Some(p.unwrap_or(0) + d.unwrap_or(0)),
        }
    }

    /// Record one autoresponse to a domain in the transient delta map
    pub fn record_response(&mut self, domain: &str) {
        *self.delta.entry(domain.to_lowercase()).or_insert(0) += 1;
    }

    /// Merge this run's deltas into the persisted table, exactly once.
    ///
    /// Each delta updates the matching row's count cell, or appends a new
    /// row for a domain seen for the first time. The delta map is emptied
    /// on the way so a later pass within the same run cannot re-merge.
    pub fn drain_and_merge(&mut self, table: &dyn TableStore) -> Result<()> {
        let mut drained: Vec<(String, u64)> = self.delta.drain().collect();
        // Deterministic write order
        drained.sort();

        for (domain, delta) in drained {
            match self.counts.get_mut(&domain) {
                Some(entry) => {
                    entry.count += delta;
                    table
                        .set_cell(
                            tables::DOMAIN_RESPONSES,
                            entry.row,
                            columns::COUNT,
                            &entry.count.to_string(),
                        )
                        .with_context(|| format!("Failed to update count for {}", domain))?;
                }
                None => {
                    table
                        .append_row(
                            tables::DOMAIN_RESPONSES,
                            vec![domain.clone(), delta.to_string()],
                        )
                        .with_context(|| format!("Failed to append count for {}", domain))?;
                    self.counts.insert(
                        domain,
                        PersistedCount {
                            count: delta,
                            row: self.next_row,
                        },
                    );
                    self.next_row += 1;
                }
            }
        }
        Ok(())
    }

    /// Whether any deltas are waiting to be merged
    pub fn has_pending_deltas(&self) -> bool {
        !self.delta.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::InMemoryTableStore;

    fn store_with(exclusions: &[&str], counts: &[(&str, &str)]) -> InMemoryTableStore {
        let table = InMemoryTableStore::new();
        for pattern in exclusions {
            table
                .append_row(tables::TRACK_EXCLUSIONS, vec![pattern.to_string()])
                .unwrap();
        }
        for (domain, count) in counts {
            table
                .append_row(
                    tables::DOMAIN_RESPONSES,
                    vec![domain.to_string(), count.to_string()],
                )
                .unwrap();
        }
        table
    }

    #[test]
    fn test_exact_domain_exclusion() {
        let table = store_with(&["@spam.com"], &[]);
        let store = SuppressionStore::load(&table).unwrap();
        assert!(store.is_excluded("a@spam.com", "@spam.com", "A <a@spam.com>"));
        assert!(!store.is_excluded("a@ok.com", "@ok.com", "A <a@ok.com>"));
    }

    #[test]
    fn test_exact_address_exclusion_case_insensitive() {
        let table = store_with(&["Noreply@Jobs.com"], &[]);
        let store = SuppressionStore::load(&table).unwrap();
        assert!(store.is_excluded("noreply@jobs.com", "@jobs.com", "noreply@jobs.com"));
    }

    #[test]
    fn test_regex_exclusion_against_raw_header() {
        let table = store_with(&["no-?reply@"], &[]);
        let store = SuppressionStore::load(&table).unwrap();
        assert!(store.is_excluded(
            "noreply@corp.com",
            "@corp.com",
            "Corp <noreply@corp.com>"
        ));
        assert!(store.is_excluded(
            "no-reply@corp.com",
            "@corp.com",
            "Corp <no-reply@corp.com>"
        ));
    }

    #[test]
    fn test_invalid_regex_still_matches_exactly() {
        let table = store_with(&["(@bad.com"], &[]);
        let store = SuppressionStore::load(&table).unwrap();
        assert!(store.is_excluded("(@bad.com", "", "(@bad.com"));
        assert!(!store.is_excluded("a@bad.com", "@bad.com", "a@bad.com"));
    }

    #[test]
    fn test_response_count_includes_delta() {
        let table = store_with(&[], &[("@company.com", "2")]);
        let mut store = SuppressionStore::load(&table).unwrap();
        assert_eq!(store.response_count("@company.com"), Some(2));
        store.record_response("@company.com");
        assert_eq!(store.response_count("@company.com"), Some(3));
        assert_eq!(store.response_count("@new.com"), None);
        store.record_response("@new.com");
        assert_eq!(store.response_count("@new.com"), Some(1));
    }

    #[test]
    fn test_drain_and_merge_updates_and_appends() {
        let table = store_with(&[], &[("@company.com", "2")]);
        let mut store = SuppressionStore::load(&table).unwrap();
        store.record_response("@company.com");
        store.record_response("@fresh.com");
        store.record_response("@fresh.com");

        store.drain_and_merge(&table).unwrap();

        let rows = table.read_all(tables::DOMAIN_RESPONSES).unwrap();
        assert_eq!(rows[0], vec!["@company.com".to_string(), "3".to_string()]);
        assert_eq!(rows[1], vec!["@fresh.com".to_string(), "2".to_string()]);
        assert!(!store.has_pending_deltas());
    }

    #[test]
    fn test_drain_twice_does_not_double_count() {
        let table = store_with(&[], &[("@company.com", "2")]);
        let mut store = SuppressionStore::load(&table).unwrap();
        store.record_response("@company.com");

        store.drain_and_merge(&table).unwrap();
        store.drain_and_merge(&table).unwrap();

        let rows = table.read_all(tables::DOMAIN_RESPONSES).unwrap();
        assert_eq!(rows[0][1], "3");
    }

    #[test]
    fn test_merge_then_record_again_targets_updated_row() {
        let table = store_with(&[], &[]);
        let mut store = SuppressionStore::load(&table).unwrap();
        store.record_response("@a.com");
        store.drain_and_merge(&table).unwrap();

        store.record_response("@a.com");
        store.drain_and_merge(&table).unwrap();

        let rows = table.read_all(tables::DOMAIN_RESPONSES).unwrap();
        assert_eq!(rows, vec![vec!["@a.com".to_string(), "2".to_string()]]);
    }
}
