//! Scan runner
//!
//! One run: ensure the label exists, rebuild the run-scoped state from
//! the tracking tables, classify every thread under the label, commit
//! the accumulated row mutations, send pending autoresponses, and merge
//! the response counters back.
//!
//! A run is idempotent: re-running over an unchanged mailbox inserts
//! nothing and sends nothing.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Instant;

use crate::aggregate::RunAggregator;
use crate::engine::{Decision, DecisionEngine, PendingResponses, ResponsePayload};
use crate::extract;
use crate::index::ThreadIndex;
use crate::provider::MailProvider;
use crate::settings::RunConfig;
use crate::suppression::SuppressionStore;
use crate::table::TableStore;

/// Outcome counts for one run
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub threads_scanned: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped_suppressed: usize,
    pub skipped_duplicate: usize,
    pub responses_sent: usize,
    /// Threads skipped or sends dropped due to provider errors
    pub errors: usize,
    pub duration_ms: u128,
    /// Matched compensation substrings with occurrence counts
    pub compensation: Vec<(String, usize)>,
}

/// Run one full scan
pub fn run_scan(
    provider: &dyn MailProvider,
    table: &dyn TableStore,
    config: &RunConfig,
) -> Result<ScanStats> {
    let started = Instant::now();
    let mut stats = ScanStats::default();

    provider
        .ensure_label(&config.label)
        .with_context(|| format!("Failed to ensure label '{}'", config.label))?;

    let mut suppression = SuppressionStore::load(table)?;
    let index = ThreadIndex::load(table)?;

    let thread_ids = provider
        .search_thread_ids(&config.label)
        .with_context(|| format!("Failed to search threads for label '{}'", config.label))?;
    info!(
        "scanning {} threads under '{}' ({} already tracked)",
        thread_ids.len(),
        config.label,
        index.len()
    );

    let mut engine = DecisionEngine::new(config, &index, &suppression);
    let mut aggregator = RunAggregator::new();

    for id in &thread_ids {
        let thread = match provider.fetch_thread(id) {
            Ok(thread) => thread,
            // One bad thread never aborts the run
            Err(e) => {
                warn!("skipping thread {}: {:#}", id.as_str(), e);
                stats.errors += 1;
                continue;
            }
        };
        if thread.messages.is_empty() {
            debug!("thread {} has no messages", id.as_str());
            continue;
        }
        stats.threads_scanned += 1;

        match engine.classify(&thread) {
            Decision::SkipSuppressed => stats.skipped_suppressed += 1,
            Decision::SkipDuplicate => stats.skipped_duplicate += 1,
            Decision::UpdateExisting {
                thread_id,
                position,
                recipients,
            } => aggregator.push_update(thread_id, position, recipients),
            Decision::InsertNew(record) => aggregator.push_insert(*record),
        }
    }

    stats.inserted = aggregator.inserted();
    stats.updated = aggregator.updated();
    stats.compensation = aggregator.compensation_summary();

    aggregator
        .commit(table)
        .context("Failed to commit scan results")?;

    let pending = engine.into_pending();
    stats.responses_sent = send_responses(provider, config, &mut suppression, &pending, &mut stats);

    suppression
        .drain_and_merge(table)
        .context("Failed to persist response counts")?;

    stats.duration_ms = started.elapsed().as_millis();
    info!(
        "scan done in {}ms: {} scanned, {} inserted, {} updated, {} suppressed, {} duplicate, {} sent, {} errors",
        stats.duration_ms,
        stats.threads_scanned,
        stats.inserted,
        stats.updated,
        stats.skipped_suppressed,
        stats.skipped_duplicate,
        stats.responses_sent,
        stats.errors,
    );
    Ok(stats)
}

/// Send phase.
///
/// Re-checks the per-domain counter before each send because addresses
/// queued earlier in this run may share a domain. Counters increment
/// only after a send succeeds, so a failed send retries next run.
fn send_responses(
    provider: &dyn MailProvider,
    config: &RunConfig,
    suppression: &mut SuppressionStore,
    pending: &PendingResponses,
    stats: &mut ScanStats,
) -> usize {
    let mut sent = 0;

    for (address, payload) in pending.iter() {
        let Some(domain) = extract::address_domain(address) else {
            debug!("not responding to unparseable address '{}'", address);
            continue;
        };
        if suppression.response_count(&domain).is_some() {
            debug!("domain {} already responded to, skipping {}", domain, address);
            continue;
        }

        let result = match payload {
            ResponsePayload::ReplyToThread {
                thread_id,
                person_name,
            } => provider.reply(thread_id, address, &config.compose_response(person_name)),
            ResponsePayload::NewMessage {
                subject,
                person_name,
            } => provider.send_new(
                address,
                subject,
                &config.compose_response(person_name),
            ),
        };

        match result {
            Ok(()) => {
                suppression.record_response(&domain);
                info!("sent autoresponse to {}", address);
                sent += 1;
            }
            Err(e) => {
                warn!("failed to send autoresponse to {}: {:#}", address, e);
                stats.errors += 1;
            }
        }
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailAddress, MailThread, MessageRecord, ThreadId, columns};
    use crate::provider::FakeProvider;
    use crate::settings::Settings;
    use crate::table::{InMemoryTableStore, tables};
    use chrono::{TimeZone, Utc};

    fn config() -> RunConfig {
        RunConfig::from_settings(&Settings {
            email: "me@owndomain.com".to_string(),
            name_for_email: "Me".to_string(),
            label_to_search: "job-search".to_string(),
            subject: "Regarding your outreach".to_string(),
            response_body: "Hi {name}".to_string(),
            ..Settings::default()
        })
        .unwrap()
    }

    fn message(id: &str, from: &str, body: &str, day: u32) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            from: from.to_string(),
            reply_to: String::new(),
            to: Vec::new(),
            subject: "Senior Rust Engineer".to_string(),
            body: body.to_string(),
            date: Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap(),
        }
    }

    fn thread(id: &str, messages: Vec<MessageRecord>) -> MailThread {
        MailThread {
            id: ThreadId::new(id),
            permalink: format!("https://mail.example.com/{}", id),
            messages,
        }
    }

    fn auto_reply(to: &[&str], day: u32) -> MessageRecord {
        let mut msg = message("reply", "Me <me@owndomain.com>", "away", day);
        msg.to = to.iter().map(|a| EmailAddress::new(*a)).collect();
        msg
    }

    #[test]
    fn test_scan_inserts_and_responds() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "John <john@corp.com>", "pay: $150-180k", 1)],
        ));
        let table = InMemoryTableStore::new();

        let stats = run_scan(&provider, &table, &config()).unwrap();

        assert_eq!(stats.threads_scanned, 1);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.responses_sent, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.compensation, vec![("$150-180".to_string(), 1)]);

        let rows = table.read_all(tables::THREADS).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][columns::SENDER_EMAIL], "john@corp.com");

        // The reply went in-thread and the counter persisted
        let sent = provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "john@corp.com");
        assert_eq!(sent[0].thread_id, Some(ThreadId::new("t1")));
        assert_eq!(sent[0].body, "Hi John");
        let counts = table.read_all(tables::DOMAIN_RESPONSES).unwrap();
        assert_eq!(counts, vec![vec!["@corp.com".to_string(), "1".to_string()]]);
        assert_eq!(provider.labels(), vec!["job-search"]);
    }

    #[test]
    fn test_rescan_is_idempotent() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "John <john@corp.com>", "hello", 1)],
        ));
        let table = InMemoryTableStore::new();
        let cfg = config();

        run_scan(&provider, &table, &cfg).unwrap();
        let stats = run_scan(&provider, &table, &cfg).unwrap();

        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.skipped_duplicate, 1);
        assert_eq!(stats.responses_sent, 0);
        assert_eq!(table.read_all(tables::THREADS).unwrap().len(), 1);
        assert_eq!(provider.sent().len(), 1);
    }

    #[test]
    fn test_excluded_sender_never_lands_anywhere() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "Spam <noise@spam.com>", "buy", 1)],
        ));
        let table = InMemoryTableStore::new();
        table
            .append_row(tables::TRACK_EXCLUSIONS, vec!["@spam.com".to_string()])
            .unwrap();

        let stats = run_scan(&provider, &table, &config()).unwrap();

        assert_eq!(stats.skipped_suppressed, 1);
        assert_eq!(stats.inserted, 0);
        assert!(table.read_all(tables::THREADS).unwrap().is_empty());
        assert!(provider.sent().is_empty());
        // Counters untouched
        assert!(table.read_all(tables::DOMAIN_RESPONSES).unwrap().is_empty());
    }

    #[test]
    fn test_auto_reply_transitions_existing_row() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "John <john@corp.com>", "hello", 1)],
        ));
        let table = InMemoryTableStore::new();
        let cfg = config();
        run_scan(&provider, &table, &cfg).unwrap();

        // The auto reply arrives before the next run
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![
                message("m1", "John <john@corp.com>", "hello", 1),
                auto_reply(&["john@corp.com"], 2),
            ],
        ));
        let stats = run_scan(&provider, &table, &cfg).unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.inserted, 0);
        let rows = table.read_all(tables::THREADS).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][columns::AUTO_RESPONSE], "john@corp.com");
        // Domain already responded to in run one, so nothing sent
        assert!(provider.sent().is_empty());
    }

    #[test]
    fn test_one_response_per_domain_within_a_run() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "John <john@corp.com>", "also cc jane@corp.com", 1)],
        ));
        let table = InMemoryTableStore::new();

        let stats = run_scan(&provider, &table, &config()).unwrap();

        assert_eq!(stats.responses_sent, 1);
        assert_eq!(provider.sent().len(), 1);
        assert_eq!(provider.sent()[0].to, "john@corp.com");
        let counts = table.read_all(tables::DOMAIN_RESPONSES).unwrap();
        assert_eq!(counts, vec![vec!["@corp.com".to_string(), "1".to_string()]]);
    }

    #[test]
    fn test_responded_domain_is_gated_across_runs() {
        let table = InMemoryTableStore::new();
        table
            .append_row(
                tables::DOMAIN_RESPONSES,
                vec!["@corp.com".to_string(), "1".to_string()],
            )
            .unwrap();
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "John <john@corp.com>", "hello", 1)],
        ));

        let stats = run_scan(&provider, &table, &config()).unwrap();

        // Row still inserted, but no send
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.responses_sent, 0);
        assert!(provider.sent().is_empty());
    }

    #[test]
    fn test_failed_fetch_skips_only_that_thread() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "bad",
            vec![message("m1", "A <a@one.com>", "hi", 1)],
        ));
        provider.push_thread(thread(
            "good",
            vec![message("m2", "B <b@two.com>", "hi", 2)],
        ));
        provider.fail_thread("bad");
        let table = InMemoryTableStore::new();

        let stats = run_scan(&provider, &table, &config()).unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.inserted, 1);
        let rows = table.read_all(tables::THREADS).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][columns::THREAD_ID], "good");
    }

    #[test]
    fn test_failed_send_does_not_record_counter() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message("m1", "John <john@corp.com>", "hello", 1)],
        ));
        provider.fail_sends_to("john@corp.com");
        let table = InMemoryTableStore::new();

        let stats = run_scan(&provider, &table, &config()).unwrap();

        assert_eq!(stats.responses_sent, 0);
        assert_eq!(stats.errors, 1);
        // Not recorded, so the next run retries
        assert!(table.read_all(tables::DOMAIN_RESPONSES).unwrap().is_empty());
    }

    #[test]
    fn test_body_email_gets_new_message() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "t1",
            vec![message(
                "m1",
                "John <john@corp.com>",
                "our recruiter is pat@agency.com",
                1,
            )],
        ));
        let table = InMemoryTableStore::new();

        let stats = run_scan(&provider, &table, &config()).unwrap();

        assert_eq!(stats.responses_sent, 2);
        let sent = provider.sent();
        assert_eq!(sent[0].to, "john@corp.com");
        assert!(sent[0].thread_id.is_some());
        assert_eq!(sent[1].to, "pat@agency.com");
        assert_eq!(sent[1].thread_id, None);
        assert_eq!(
            sent[1].subject,
            Some("Senior Rust Engineer".to_string())
        );
    }

    #[test]
    fn test_new_rows_sorted_newest_first() {
        let provider = FakeProvider::new();
        provider.push_thread(thread(
            "older",
            vec![message("m1", "A <a@one.com>", "hi", 1)],
        ));
        provider.push_thread(thread(
            "newer",
            vec![message("m2", "B <b@two.com>", "hi", 5)],
        ));
        let table = InMemoryTableStore::new();

        run_scan(&provider, &table, &config()).unwrap();

        let ids: Vec<_> = table
            .read_all(tables::THREADS)
            .unwrap()
            .iter()
            .map(|r| r[columns::THREAD_ID].clone())
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }
}
