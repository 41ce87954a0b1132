//! Mail provider trait definition

use anyhow::Result;

use crate::models::{MailThread, ThreadId};

/// Trait for the mailbox side of a run
///
/// Thread search and fetch are split so one unreadable thread can be
/// skipped without aborting the run.
pub trait MailProvider: Send + Sync {
    /// Create a label if it does not exist; returns the label's id.
    /// Creating an existing label is a no-op lookup, not an error.
    fn ensure_label(&self, name: &str) -> Result<String>;

    /// IDs of every thread carrying the label, in provider order
    fn search_thread_ids(&self, label: &str) -> Result<Vec<ThreadId>>;

    /// Fetch a thread with all its messages, oldest first
    fn fetch_thread(&self, id: &ThreadId) -> Result<MailThread>;

    /// Compose and send a fresh message
    fn send_new(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    /// Send a reply within an existing thread
    fn reply(&self, thread_id: &ThreadId, to: &str, body: &str) -> Result<()>;
}
