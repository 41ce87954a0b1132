//! Message model used at the provider boundary
//!
//! The core never touches provider API payloads directly; the provider
//! adapter normalizes everything into [`MessageRecord`] first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    ///
    /// Lenient: a bare address without angle brackets is accepted as-is.
    /// The stricter sender extraction used for classification lives in
    /// [`crate::extract::parse_sender`].
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Parse a comma-separated header value ("a@x.com, Bob <b@y.com>")
    pub fn parse_list(s: &str) -> Vec<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Format the address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A single message within a scanned thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Provider-assigned message ID
    pub id: String,
    /// Raw From header, display name and all
    pub from: String,
    /// Raw Reply-To header; empty when the header is absent
    pub reply_to: String,
    /// Recipients (To field)
    pub to: Vec<EmailAddress>,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
    /// When the message was received
    pub date: DateTime<Utc>,
}
