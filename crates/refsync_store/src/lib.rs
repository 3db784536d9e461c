//! SQLite persistence for refsync.
//!
//! Provides [`SqliteStore`], which owns one table per entity type plus a run
//! history table, and [`SqliteSink`], the engine's [`Sink`](refsync_engine::Sink)
//! over one of those tables.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use sqlite::{RunRecord, SqliteSink, SqliteStore};
