//! Request log
//!
//! Optional SQLite audit trail of vendor requests, with aggregate statistics.
//!
//! ## Architecture
//!
//! - `db.rs`: RequestLog, schema initialization
//! - `record.rs`: Row types and inserts
//! - `stats.rs`: Aggregate statistics per table

pub mod db;
pub mod record;
pub mod stats;

// Re-export main types
pub use db::{Error, RequestLog};
pub use record::{QwenRequestRow, TranslateRequestRow};
pub use stats::{QwenStats, TranslateStats};
