//! Thread models: the scanned thread shape and the persisted tracking row

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MessageRecord;

/// Unique identifier for a thread (provider-assigned, stable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A scanned thread as handed over by the mail provider
#[derive(Debug, Clone)]
pub struct MailThread {
    /// Provider thread ID
    pub id: ThreadId,
    /// Stable external reference URL, stored for audit only
    pub permalink: String,
    /// Messages in thread order; the first element opened the thread
    pub messages: Vec<MessageRecord>,
}

impl MailThread {
    /// The thread-opening message, if the provider returned any at all
    pub fn opening_message(&self) -> Option<&MessageRecord> {
        self.messages.first()
    }

    /// Every message after the thread-opening one
    pub fn replies(&self) -> &[MessageRecord] {
        if self.messages.is_empty() {
            &[]
        } else {
            &self.messages[1..]
        }
    }
}

/// Column layout of the threads table
///
/// `CREATED_AT` doubles as the sort column for the post-insert re-sort.
pub mod columns {
    pub const THREAD_ID: usize = 0;
    pub const FIRST_MESSAGE_ID: usize = 1;
    pub const CREATED_AT: usize = 2;
    pub const SENDER_EMAIL: usize = 3;
    pub const REPLY_TO: usize = 4;
    pub const PERSON_NAME: usize = 5;
    pub const SUBJECT: usize = 6;
    pub const BODY_EMAILS: usize = 7;
    pub const BODY: usize = 8;
    pub const COMPENSATION: usize = 9;
    pub const PERMALINK: usize = 10;
    pub const AUTO_RESPONSE: usize = 11;

    /// Total number of columns in a threads row
    pub const WIDTH: usize = 12;
}

/// Separator for list-valued cells (body emails, auto-response recipients)
const LIST_SEPARATOR: char = ';';

/// One tracked thread
///
/// Exactly one record exists per thread id in the threads table; that
/// uniqueness is the central invariant of the whole system.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    /// ID of the thread-opening message
    pub first_message_id: String,
    /// Timestamp of the thread-opening message
    pub created_at: DateTime<Utc>,
    /// Extracted sender address; empty when the From header was malformed
    pub sender_email: String,
    /// Raw Reply-To address; empty when absent
    pub reply_to: String,
    /// Display-name portion of the From header
    pub person_name: String,
    pub subject: String,
    /// Deduplicated addresses found inside the body text
    pub body_emails: Vec<String>,
    /// Full plain-text body
    pub body: String,
    /// Literal compensation substring matched in the body, if any
    pub compensation: Option<String>,
    pub permalink: String,
    /// None until an auto-response reply is observed on the thread, then
    /// the recipient addresses of the detected reply. Never reverts.
    pub auto_response: Option<Vec<String>>,
}

impl ThreadRecord {
    /// Serialize to a threads-table row (see [`columns`])
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.thread_id.0.clone(),
            self.first_message_id.clone(),
            self.created_at.to_rfc3339(),
            self.sender_email.clone(),
            self.reply_to.clone(),
            self.person_name.clone(),
            self.subject.clone(),
            join_list(&self.body_emails),
            self.body.clone(),
            self.compensation.clone().unwrap_or_default(),
            self.permalink.clone(),
            self.auto_response
                .as_deref()
                .map(join_list)
                .unwrap_or_default(),
        ]
    }

    /// Deserialize from a threads-table row
    pub fn from_row(row: &[String]) -> Result<Self> {
        if row.len() < columns::WIDTH {
            bail!(
                "threads row has {} columns, expected {}",
                row.len(),
                columns::WIDTH
            );
        }

        let created_at = DateTime::parse_from_rfc3339(&row[columns::CREATED_AT])
            .with_context(|| format!("bad timestamp in threads row: '{}'", row[columns::CREATED_AT]))?
            .with_timezone(&Utc);

        Ok(Self {
            thread_id: ThreadId::new(row[columns::THREAD_ID].clone()),
            first_message_id: row[columns::FIRST_MESSAGE_ID].clone(),
            created_at,
            sender_email: row[columns::SENDER_EMAIL].clone(),
            reply_to: row[columns::REPLY_TO].clone(),
            person_name: row[columns::PERSON_NAME].clone(),
            subject: row[columns::SUBJECT].clone(),
            body_emails: split_list(&row[columns::BODY_EMAILS]),
            body: row[columns::BODY].clone(),
            compensation: non_empty(&row[columns::COMPENSATION]),
            permalink: row[columns::PERMALINK].clone(),
            auto_response: non_empty(&row[columns::AUTO_RESPONSE])
                .map(|cell| split_list(&cell)),
        })
    }

    /// Serialize an auto-response recipient list for a targeted cell write
    pub fn auto_response_cell(recipients: &[String]) -> String {
        join_list(recipients)
    }
}

fn join_list(items: &[String]) -> String {
    items.join(&LIST_SEPARATOR.to_string())
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(cell: &str) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}
