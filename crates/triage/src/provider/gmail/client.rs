//! Gmail API HTTP client
//!
//! Implements [`MailProvider`] against the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, info};
use std::time::Duration;

use super::api::{GmailThread, ListLabelsResponse, ListThreadsResponse};
use super::{GmailAuth, normalize_thread};
use crate::models::{MailThread, ThreadId};
use crate::provider::MailProvider;

/// Gmail API client
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Create a new Gmail client
    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// Trigger the authentication flow up front
    pub fn authenticate(&self) -> Result<()> {
        self.auth.get_access_token()?;
        Ok(())
    }

    fn bearer(&self) -> Result<String> {
        let access_token = self.auth.get_access_token()?;
        Ok(format!("Bearer {}", access_token))
    }

    /// List one page of thread ids matching a query
    fn list_threads(&self, query: &str, page_token: Option<&str>) -> Result<ListThreadsResponse> {
        let mut url = format!(
            "{}/users/me/threads?maxResults=500&q={}",
            Self::BASE_URL,
            urlencoding::encode(query)
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send list threads request")?;

        let list: ListThreadsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list threads response")?;

        Ok(list)
    }

    /// Get a full thread by ID
    fn get_thread(&self, id: &ThreadId) -> Result<GmailThread> {
        let url = format!(
            "{}/users/me/threads/{}?format=full",
            Self::BASE_URL,
            id.as_str()
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send get thread request")?;

        let thread: GmailThread = response
            .body_mut()
            .read_json()
            .context("Failed to parse thread response")?;

        Ok(thread)
    }

    /// Get a thread with exponential backoff retry
    fn get_thread_with_retry(&self, id: &ThreadId, max_retries: u32) -> Result<GmailThread> {
        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..max_retries {
            match self.get_thread(id) {
                Ok(thread) => return Ok(thread),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries - 1 {
                        // Add jitter to delay
                        let jitter = Duration::from_millis(rand_jitter());
                        std::thread::sleep(delay + jitter);
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }

    /// List all labels in the user's mailbox
    fn list_labels(&self) -> Result<ListLabelsResponse> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send list labels request")?;

        let labels: ListLabelsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse labels response")?;

        Ok(labels)
    }

    fn create_label(&self, name: &str) -> Result<String> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(serde_json::json!({
                "name": name,
                "labelListVisibility": "labelShow",
                "messageListVisibility": "show",
            }))
            .context("Failed to create label")?;

        let label: super::api::GmailLabel = response
            .body_mut()
            .read_json()
            .context("Failed to parse create label response")?;

        info!("Created label '{}' ({})", name, label.id);
        Ok(label.id)
    }

    /// Send a raw RFC 822 message, optionally attached to an existing thread
    fn send_raw(&self, raw_message: &str, thread_id: Option<&ThreadId>) -> Result<()> {
        let url = format!("{}/users/me/messages/send", Self::BASE_URL);
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(raw_message.as_bytes());

        let mut payload = serde_json::json!({ "raw": encoded });
        if let Some(id) = thread_id {
            payload["threadId"] = serde_json::Value::String(id.as_str().to_string());
        }

        ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(payload)
            .context("Failed to send message")?;

        Ok(())
    }
}

impl MailProvider for GmailClient {
    fn ensure_label(&self, name: &str) -> Result<String> {
        let labels = self.list_labels()?;
        if let Some(existing) = labels
            .labels
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
        {
            debug!("Label '{}' already exists ({})", name, existing.id);
            return Ok(existing.id);
        }
        self.create_label(name)
    }

    fn search_thread_ids(&self, label: &str) -> Result<Vec<ThreadId>> {
        let query = format!("label:\"{}\"", label);
        let mut ids = Vec::new();
        let mut page_token = None;

        loop {
            let response = self.list_threads(&query, page_token.as_deref())?;

            if let Some(threads) = response.threads {
                ids.extend(threads.into_iter().map(|t| ThreadId::new(t.id)));
            }

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Found {} threads for label '{}'", ids.len(), label);
        Ok(ids)
    }

    fn fetch_thread(&self, id: &ThreadId) -> Result<MailThread> {
        let thread = self.get_thread_with_retry(id, 3)?;
        normalize_thread(thread)
    }

    fn send_new(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let raw = format!(
            "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
            to, subject, body
        );
        self.send_raw(&raw, None)
    }

    fn reply(&self, thread_id: &ThreadId, to: &str, body: &str) -> Result<()> {
        let raw = format!(
            "To: {}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
            to, body
        );
        self.send_raw(&raw, Some(thread_id))
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
