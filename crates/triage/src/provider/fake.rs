//! In-memory mail provider
//!
//! Used by scan tests to script mailbox contents and observe outbound
//! sends without any network.

use anyhow::{Result, bail};
use std::collections::HashSet;
use std::sync::RwLock;

use super::traits::MailProvider;
use crate::models::{MailThread, ThreadId};

/// One outbound message captured by the fake
#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    /// None for in-thread replies
    pub subject: Option<String>,
    /// Some for in-thread replies
    pub thread_id: Option<ThreadId>,
    pub body: String,
}

/// In-memory implementation of [`MailProvider`]
#[derive(Default)]
pub struct FakeProvider {
    threads: RwLock<Vec<MailThread>>,
    sent: RwLock<Vec<SentMail>>,
    labels: RwLock<Vec<String>>,
    /// Thread ids whose fetch fails, to exercise per-thread skip
    failing: RwLock<HashSet<String>>,
    /// Addresses whose sends fail
    failing_sends: RwLock<HashSet<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a thread into the mailbox
    pub fn push_thread(&self, thread: MailThread) {
        self.threads.write().unwrap().push(thread);
    }

    /// Make fetching a specific thread fail
    pub fn fail_thread(&self, id: &str) {
        self.failing.write().unwrap().insert(id.to_string());
    }

    /// Make sends to a specific address fail
    pub fn fail_sends_to(&self, address: &str) {
        self.failing_sends.write().unwrap().insert(address.to_string());
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.read().unwrap().clone()
    }

    /// Labels created so far
    pub fn labels(&self) -> Vec<String> {
        self.labels.read().unwrap().clone()
    }
}

impl MailProvider for FakeProvider {
    fn ensure_label(&self, name: &str) -> Result<String> {
        let mut labels = self.labels.write().unwrap();
        if !labels.iter().any(|l| l == name) {
            labels.push(name.to_string());
        }
        Ok(format!("Label_{}", name))
    }

    fn search_thread_ids(&self, _label: &str) -> Result<Vec<ThreadId>> {
        Ok(self
            .threads
            .read()
            .unwrap()
            .iter()
            .map(|t| t.id.clone())
            .collect())
    }

    fn fetch_thread(&self, id: &ThreadId) -> Result<MailThread> {
        if self.failing.read().unwrap().contains(id.as_str()) {
            bail!("scripted fetch failure for thread {}", id.as_str());
        }
        self.threads
            .read()
            .unwrap()
            .iter()
            .find(|t| t.id == *id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such thread: {}", id.as_str()))
    }

    fn send_new(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.failing_sends.read().unwrap().contains(to) {
            bail!("scripted send failure to {}", to);
        }
        self.sent.write().unwrap().push(SentMail {
            to: to.to_string(),
            subject: Some(subject.to_string()),
            thread_id: None,
            body: body.to_string(),
        });
        Ok(())
    }

    fn reply(&self, thread_id: &ThreadId, to: &str, body: &str) -> Result<()> {
        if self.failing_sends.read().unwrap().contains(to) {
            bail!("scripted send failure to {}", to);
        }
        self.sent.write().unwrap().push(SentMail {
            to: to.to_string(),
            subject: None,
            thread_id: Some(thread_id.clone()),
            body: body.to_string(),
        });
        Ok(())
    }
}
