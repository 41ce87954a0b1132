//! Domain models for scanned and tracked threads

mod message;
mod thread;

pub use message::{EmailAddress, MessageRecord};
pub use thread::{MailThread, ThreadId, ThreadRecord, columns};
