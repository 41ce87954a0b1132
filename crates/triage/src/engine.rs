//! Per-thread decision engine
//!
//! Combines the thread index and suppression state with freshly extracted
//! data to classify each scanned thread. Every thread resolves to exactly
//! one outcome per run, evaluated strictly in the order suppression check,
//! index lookup, then update-vs-insert.
//!
//! As a side effect of Insert-New and Update-Existing, candidate reply
//! addresses are collected into the pending-response map consumed by the
//! send phase at end-of-run.

use log::debug;
use std::collections::HashMap;

use crate::extract;
use crate::index::ThreadIndex;
use crate::models::{MailThread, MessageRecord, ThreadId, ThreadRecord};
use crate::settings::RunConfig;
use crate::suppression::SuppressionStore;

/// Terminal outcome for one scanned thread
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Sender or domain matches a track-exclusion entry; no row, no
    /// counter change
    SkipSuppressed,
    /// Already tracked and no new auto-response reply detected
    SkipDuplicate,
    /// Already tracked; an auto-response reply appeared since the row was
    /// written. Mutates only the auto-response cell.
    UpdateExisting {
        thread_id: ThreadId,
        /// Row position at index-load time; re-resolved at commit
        position: usize,
        recipients: Vec<String>,
    },
    /// Not yet tracked and not suppressed
    InsertNew(Box<ThreadRecord>),
}

/// What to send to a pending recipient
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Reply within the thread the address came from
    ReplyToThread {
        thread_id: ThreadId,
        person_name: String,
    },
    /// Compose a fresh message
    NewMessage {
        subject: String,
        person_name: String,
    },
}

impl ResponsePayload {
    fn is_reply(&self) -> bool {
        matches!(self, ResponsePayload::ReplyToThread { .. })
    }
}

/// Recipient → payload map built during one run, never persisted.
///
/// Exists only so no address receives more than one payload per run:
/// first insert wins, except a reply payload replaces a new-message
/// payload for the same address. Iterates in insertion order.
#[derive(Default)]
pub struct PendingResponses {
    order: Vec<String>,
    payloads: HashMap<String, ResponsePayload>,
}

impl PendingResponses {
    /// Offer a payload for an address; returns whether it was stored
    fn offer(&mut self, address: &str, payload: ResponsePayload) -> bool {
        match self.payloads.get(address) {
            None => {
                self.order.push(address.to_string());
                self.payloads.insert(address.to_string(), payload);
                true
            }
            // Reply payloads take precedence over new-message payloads
            Some(existing) if !existing.is_reply() && payload.is_reply() => {
                self.payloads.insert(address.to_string(), payload);
                true
            }
            Some(_) => false,
        }
    }

    /// Addresses and payloads in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResponsePayload)> {
        self.order
            .iter()
            .filter_map(|addr| self.payloads.get(addr).map(|p| (addr.as_str(), p)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Per-thread classifier for one run
pub struct DecisionEngine<'a> {
    config: &'a RunConfig,
    index: &'a ThreadIndex,
    suppression: &'a SuppressionStore,
    pending: PendingResponses,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(
        config: &'a RunConfig,
        index: &'a ThreadIndex,
        suppression: &'a SuppressionStore,
    ) -> Self {
        Self {
            config,
            index,
            suppression,
            pending: PendingResponses::default(),
        }
    }

    /// Classify one scanned thread.
    ///
    /// The caller guarantees the thread has at least one message.
    pub fn classify(&mut self, thread: &MailThread) -> Decision {
        let Some(first) = thread.opening_message() else {
            // Defensive; scan filters these out
            return Decision::SkipDuplicate;
        };

        // Sender extraction failure degrades locally: empty fields, the
        // raw header still participates in regex exclusion checks
        let (sender_email, sender_domain, person_name) = match extract::parse_sender(&first.from) {
            Ok(sender) => (sender.email, sender.domain, sender.name),
            Err(e) => {
                debug!("thread {}: {}", thread.id.as_str(), e);
                (String::new(), String::new(), extract::person_name(&first.from))
            }
        };

        if self
            .suppression
            .is_excluded(&sender_email, &sender_domain, &first.from)
        {
            return Decision::SkipSuppressed;
        }

        let recipients = self.auto_response_recipients(thread.replies());

        if let Some(existing) = self.index.lookup(&thread.id) {
            if recipients.is_empty()
                || existing.record.auto_response.as_deref() == Some(recipients.as_slice())
            {
                return Decision::SkipDuplicate;
            }
            self.queue_responses(&thread.id, &existing.record);
            return Decision::UpdateExisting {
                thread_id: thread.id.clone(),
                position: existing.position,
                recipients,
            };
        }

        let record = self.build_record(thread, first, sender_email, person_name, recipients);
        self.queue_responses(&thread.id, &record);
        Decision::InsertNew(Box::new(record))
    }

    /// Hand over the pending-response map for the send phase
    pub fn into_pending(self) -> PendingResponses {
        self.pending
    }

    /// Recipient addresses of replies bearing the auto-response signature
    fn auto_response_recipients(&self, replies: &[MessageRecord]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut recipients = Vec::new();
        for reply in replies {
            if !self.config.is_auto_responder(&reply.from) {
                continue;
            }
            for addr in &reply.to {
                if seen.insert(addr.email.to_lowercase()) {
                    recipients.push(addr.email.clone());
                }
            }
        }
        recipients
    }

    fn build_record(
        &self,
        thread: &MailThread,
        first: &MessageRecord,
        sender_email: String,
        person_name: String,
        recipients: Vec<String>,
    ) -> ThreadRecord {
        let reply_to = if first.reply_to.is_empty() {
            String::new()
        } else {
            crate::models::EmailAddress::parse(&first.reply_to).email
        };

        ThreadRecord {
            thread_id: thread.id.clone(),
            first_message_id: first.id.clone(),
            created_at: first.date,
            sender_email,
            reply_to,
            person_name,
            subject: first.subject.clone(),
            body_emails: extract::body_emails(&first.body),
            body: first.body.clone(),
            compensation: extract::compensation_span(&first.body),
            permalink: thread.permalink.clone(),
            auto_response: if recipients.is_empty() {
                None
            } else {
                Some(recipients)
            },
        }
    }

    /// Collect candidate reply addresses from a record into the pending
    /// map. The reply-to address (falling back to the sender) is tagged
    /// as a thread reply; body-embedded addresses get a new-message
    /// payload. Excluded and already-responded domains never enter.
    fn queue_responses(&mut self, thread_id: &ThreadId, record: &ThreadRecord) {
        let reply_target = if record.reply_to.is_empty() {
            &record.sender_email
        } else {
            &record.reply_to
        };
        if !reply_target.is_empty() {
            self.offer_checked(
                reply_target.clone(),
                ResponsePayload::ReplyToThread {
                    thread_id: thread_id.clone(),
                    person_name: record.person_name.clone(),
                },
            );
        }

        for email in &record.body_emails {
            self.offer_checked(
                email.clone(),
                ResponsePayload::NewMessage {
                    subject: record.subject.clone(),
                    person_name: record.person_name.clone(),
                },
            );
        }
    }

    fn offer_checked(&mut self, address: String, payload: ResponsePayload) {
        if self.config.is_own_address(&address) {
            return;
        }
        let domain = extract::address_domain(&address).unwrap_or_default();
        if self.suppression.is_excluded(&address, &domain, &address) {
            return;
        }
        if self.suppression.response_count(&domain).is_some() {
            return;
        }
        self.pending.offer(&address, payload);
    }
}
