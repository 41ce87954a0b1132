//! Sheet-like table storage
//!
//! The persistence surface is deliberately narrow: named tables of ordered
//! string rows with bulk insert, targeted cell writes, append, and a
//! column sort. The trait-based design allows swapping the in-memory
//! backend (tests) for the sqlite one (durable) without touching the core.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryTableStore;
pub use sqlite::SqliteTableStore;
pub use traits::{Row, TableStore};

/// Names of the tables one run touches
pub mod tables {
    /// One row per tracked thread
    pub const THREADS: &str = "threads";
    /// One pattern per row; senders matching any row are never processed
    pub const TRACK_EXCLUSIONS: &str = "track_exclusions";
    /// Domain and cumulative autoresponse count, one row per domain
    pub const DOMAIN_RESPONSES: &str = "domain_responses";
}
