//! Triage crate - Business logic for job-search mail triage
//!
//! This crate provides platform-independent triage functionality including:
//! - Domain models (MailThread, MessageRecord, ThreadRecord)
//! - Gmail API client and OAuth authentication
//! - Table store trait abstractions (sheet-like persistence)
//! - Entity extraction (sender, embedded addresses, compensation)
//! - Per-thread decision engine and suppression state
//! - The idempotent scan runner
//!
//! This crate has zero UI dependencies; the jobscan CLI is a thin shell
//! around [`run_scan`].

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod provider;
pub mod scan;
pub mod settings;
pub mod suppression;
pub mod table;

pub use aggregate::RunAggregator;
pub use engine::{Decision, DecisionEngine, PendingResponses, ResponsePayload};
pub use error::{MalformedAddressError, MissingSettingError};
pub use extract::ExtractedSender;
pub use index::ThreadIndex;
pub use models::{EmailAddress, MailThread, MessageRecord, ThreadId, ThreadRecord, columns};
pub use provider::{FakeProvider, MailProvider, SentMail};
pub use provider::gmail::{GmailAuth, GmailClient, GoogleCredentials};
pub use scan::{ScanStats, run_scan};
pub use settings::{RunConfig, SETTINGS_FILE, Settings};
pub use suppression::SuppressionStore;
pub use table::{InMemoryTableStore, Row, SqliteTableStore, TableStore, tables};
