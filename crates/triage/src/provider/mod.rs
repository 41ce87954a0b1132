//! Mail provider abstraction
//!
//! The core only sees [`MailProvider`]: label-scoped thread search,
//! per-thread fetch, idempotent label creation, and outbound send. The
//! Gmail adapter implements it over the REST API; the fake keeps
//! everything in memory for tests.

mod fake;
pub mod gmail;
mod traits;

pub use fake::{FakeProvider, SentMail};
pub use traits::MailProvider;
