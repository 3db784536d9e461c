//! # refsync Engine
//!
//! Paginated full-refresh synchronization of reference catalogs.
//!
//! This crate provides:
//! - Run state machine (clearing → fetching → inserting → completed/aborted)
//! - Per-run duplicate tracking
//! - Remote catalog client abstraction with an HTTP implementation
//! - Sink abstraction over the local store
//! - Triggers: startup-if-empty, daily schedule, manual
//!
//! ## Architecture
//!
//! Every run replaces the local dataset of one entity type:
//! 1. Clear the sink
//! 2. Fetch pages 1, 2, 3, ... from the remote listing
//! 3. Insert the records whose ids have not been seen this run
//! 4. Stop on an empty page or a page with no unseen ids
//!
//! The remote API declares no page count, so the two stop signals above are
//! the only end-of-data markers.
//!
//! ## Key Invariants
//!
//! - The sink is cleared exactly once per run, before any fetch
//! - Within a completed run, stored ids are unique
//! - A failed page is skipped; the run aborts only after more than
//!   `max_consecutive_failures` consecutive failed pages with nothing inserted
//! - At most one run per entity type is in flight (enforced by the scheduler)

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![cfg_attr(not(test), warn(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod client;
mod config;
mod dedup;
mod engine;
mod entity;
mod error;
mod http;
mod record;
mod sink;
mod trigger;

pub use client::{CatalogClient, MockCatalogClient};
pub use config::{CatalogConfig, RetryConfig, ScheduleConfig, SyncConfig};
pub use dedup::DedupTracker;
pub use engine::{
    AbortReason, RunOutcome, RunState, RunSummary, StopReason, SyncEngine, SyncStats,
};
pub use entity::EntityType;
pub use error::{SyncError, SyncResult};
pub use http::{decode_listing, HttpCatalogClient, HttpClient, ReqwestClient};
pub use record::{Page, Record};
pub use sink::{MemorySink, Sink};
pub use trigger::{next_daily_run, RunHook, SyncScheduler, TriggerKind};
