//! Full-refresh sync engine state machine.
//!
//! A run clears the sink, then walks the remote listing page by page until
//! an empty page or a page with no unseen ids signals the end of the data:
//!
//! ```text
//! Idle -> Clearing -> Fetching(p) -> Inserting(p) -> Fetching(p+1) -> ... -> Completed
//!                         \-> Aborted (failure budget exhausted, clear or insert failed)
//! ```

use crate::client::CatalogClient;
use crate::config::SyncConfig;
use crate::dedup::DedupTracker;
use crate::entity::EntityType;
use crate::error::SyncResult;
use crate::record::Page;
use crate::sink::Sink;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "page")]
pub enum RunState {
    /// No run has started yet.
    Idle,
    /// Deleting the previous dataset.
    Clearing,
    /// Fetching the given page.
    Fetching(u32),
    /// Writing new records from the given page.
    Inserting(u32),
    /// The last run completed.
    Completed,
    /// The last run aborted.
    Aborted,
}

impl RunState {
    /// Returns true while a run is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunState::Clearing | RunState::Fetching(_) | RunState::Inserting(_)
        )
    }
}

/// Why a completed run stopped fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The remote returned a page with no records.
    EmptyPage,
    /// Every id on the page had already been seen this run.
    DuplicatePage,
    /// The configured page cap was reached.
    PageLimit,
}

/// Why a run aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AbortReason {
    /// The sink could not be cleared; nothing was fetched.
    ClearFailed {
        /// Sink error message.
        message: String,
    },
    /// Too many consecutive pages failed before anything was inserted.
    FetchBudgetExhausted {
        /// Consecutive failed pages at the time of abort.
        consecutive_failures: u32,
    },
    /// The sink rejected a batch.
    InsertFailed {
        /// Page whose batch was rejected.
        page: u32,
        /// Sink error message.
        message: String,
    },
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    /// The run reached the end of the remote data.
    Completed {
        /// Stop signal that ended the run.
        stop: StopReason,
    },
    /// The run gave up. The sink holds whatever was written before the abort.
    Aborted {
        /// Abort cause.
        reason: AbortReason,
    },
}

/// Summary of one run, returned to whoever triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Unique run id.
    pub run_id: Uuid,
    /// Entity type synced.
    pub entity: EntityType,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Elapsed time.
    pub duration: Duration,
    /// Page indexes visited.
    pub pages_attempted: u32,
    /// Fetch requests issued, including retries.
    pub fetch_attempts: u32,
    /// Pages with at least one fetch error, including pages recovered by a
    /// retry.
    pub failed_pages: u32,
    /// Pages skipped because every fetch attempt failed.
    pub skipped_pages: u32,
    /// Unique records inserted.
    pub inserted: u64,
    /// Remote items dropped for lacking an id.
    pub dropped: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl RunSummary {
    fn start(entity: EntityType) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            entity,
            started_at: Utc::now(),
            duration: Duration::ZERO,
            pages_attempted: 0,
            fetch_attempts: 0,
            failed_pages: 0,
            skipped_pages: 0,
            inserted: 0,
            dropped: 0,
            outcome: RunOutcome::Completed {
                stop: StopReason::EmptyPage,
            },
        }
    }

    /// Returns true if the run completed.
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    /// Returns true if the run aborted.
    pub fn is_aborted(&self) -> bool {
        !self.is_completed()
    }

    /// Stop signal of a completed run.
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.outcome {
            RunOutcome::Completed { stop } => Some(stop),
            RunOutcome::Aborted { .. } => None,
        }
    }
}

/// Cumulative statistics across runs of one engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that completed.
    pub runs_completed: u64,
    /// Runs that aborted.
    pub runs_aborted: u64,
    /// Records inserted across all runs.
    pub records_inserted: u64,
    /// Summary of the most recent run.
    pub last_run: Option<RunSummary>,
}

/// Drives full-refresh runs for one entity type.
///
/// The engine does not serialize runs; callers must not start two runs of
/// the same engine concurrently (see [`SyncScheduler`](crate::SyncScheduler)).
pub struct SyncEngine<C: CatalogClient, S: Sink> {
    entity: EntityType,
    config: SyncConfig,
    client: Arc<C>,
    sink: Arc<S>,
    state: RwLock<RunState>,
    stats: RwLock<SyncStats>,
}

impl<C: CatalogClient, S: Sink> SyncEngine<C, S> {
    /// Creates an engine for `entity` writing into `sink`.
    pub fn new(entity: EntityType, config: SyncConfig, client: Arc<C>, sink: S) -> Self {
        Self {
            entity,
            config,
            client,
            sink: Arc::new(sink),
            state: RwLock::new(RunState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Entity type this engine syncs.
    pub fn entity(&self) -> EntityType {
        self.entity
    }

    /// The sink runs write into.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The remote catalog client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        *self.state.read()
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn set_state(&self, state: RunState) {
        *self.state.write() = state;
    }

    /// Replaces the sink contents with the full remote listing.
    ///
    /// Never fails: every error ends up in the returned summary.
    pub async fn run(&self) -> RunSummary {
        let clock = Instant::now();
        let mut summary = RunSummary::start(self.entity);
        info!(entity = %self.entity, run_id = %summary.run_id, "sync run started");

        self.set_state(RunState::Clearing);
        let outcome = match self.sink.clear().await {
            Ok(()) => self.fetch_all(&mut summary).await,
            Err(e) => {
                warn!(entity = %self.entity, error = %e, "clearing sink failed");
                RunOutcome::Aborted {
                    reason: AbortReason::ClearFailed {
                        message: e.to_string(),
                    },
                }
            }
        };
        summary.outcome = outcome;
        summary.duration = clock.elapsed();

        self.finish(&summary);
        summary
    }

    async fn fetch_all(&self, summary: &mut RunSummary) -> RunOutcome {
        let mut dedup = DedupTracker::new();
        let mut page = 1u32;
        let mut consecutive_failures = 0u32;

        loop {
            if let Some(max) = self.config.max_pages {
                if page > max {
                    return RunOutcome::Completed {
                        stop: StopReason::PageLimit,
                    };
                }
            }

            self.set_state(RunState::Fetching(page));
            summary.pages_attempted += 1;

            let fetched = match self.fetch_with_retry(page, summary).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    summary.skipped_pages += 1;
                    consecutive_failures += 1;
                    warn!(
                        entity = %self.entity,
                        page,
                        consecutive_failures,
                        error = %e,
                        "page fetch failed, skipping"
                    );
                    if consecutive_failures > self.config.max_consecutive_failures
                        && summary.inserted == 0
                    {
                        return RunOutcome::Aborted {
                            reason: AbortReason::FetchBudgetExhausted {
                                consecutive_failures,
                            },
                        };
                    }
                    page = page.saturating_add(1);
                    continue;
                }
            };
            consecutive_failures = 0;
            summary.dropped += fetched.dropped as u64;

            // A page whose items were all dropped for lacking ids is not empty;
            // it falls through to the no-unseen-ids stop below.
            if fetched.is_empty() && fetched.dropped == 0 {
                debug!(entity = %self.entity, page, "empty page, stopping");
                return RunOutcome::Completed {
                    stop: StopReason::EmptyPage,
                };
            }

            let seen_on_page = fetched.len();
            let fresh = dedup.filter_new(fetched.records);
            if fresh.is_empty() {
                debug!(entity = %self.entity, page, "no unseen ids on page, stopping");
                return RunOutcome::Completed {
                    stop: StopReason::DuplicatePage,
                };
            }

            self.set_state(RunState::Inserting(page));
            if let Err(e) = self.sink.insert_batch(&fresh).await {
                warn!(entity = %self.entity, page, error = %e, "batch insert failed");
                return RunOutcome::Aborted {
                    reason: AbortReason::InsertFailed {
                        page,
                        message: e.to_string(),
                    },
                };
            }
            summary.inserted += fresh.len() as u64;
            debug!(
                entity = %self.entity,
                page,
                received = seen_on_page,
                inserted = fresh.len(),
                total = summary.inserted,
                "page stored"
            );

            if !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
            page = page.saturating_add(1);
        }
    }

    /// Fetches one page, retrying retryable failures per the retry config.
    ///
    /// A page counts once in `failed_pages` as soon as any attempt fails.
    async fn fetch_with_retry(&self, page: u32, summary: &mut RunSummary) -> SyncResult<Page> {
        let retry = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            if attempt > 0 {
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
            }
            summary.fetch_attempts += 1;

            let error = match self.client.fetch_page(self.entity, page).await {
                Ok(fetched) => return Ok(fetched),
                Err(e) => e,
            };
            if attempt == 0 {
                summary.failed_pages += 1;
            }
            if !error.is_retryable() || attempt + 1 >= retry.max_attempts {
                return Err(error);
            }
            debug!(entity = %self.entity, page, attempt, error = %error, "retrying page");
            attempt += 1;
        }
    }

    fn finish(&self, summary: &RunSummary) {
        let mut stats = self.stats.write();
        match &summary.outcome {
            RunOutcome::Completed { stop } => {
                self.set_state(RunState::Completed);
                stats.runs_completed += 1;
                info!(
                    entity = %self.entity,
                    run_id = %summary.run_id,
                    inserted = summary.inserted,
                    pages = summary.pages_attempted,
                    failed_pages = summary.failed_pages,
                    skipped_pages = summary.skipped_pages,
                    stop = ?stop,
                    elapsed_ms = summary.duration.as_millis() as u64,
                    "sync run completed"
                );
            }
            RunOutcome::Aborted { reason } => {
                self.set_state(RunState::Aborted);
                stats.runs_aborted += 1;
                warn!(
                    entity = %self.entity,
                    run_id = %summary.run_id,
                    inserted = summary.inserted,
                    pages = summary.pages_attempted,
                    reason = ?reason,
                    "sync run aborted"
                );
            }
        }
        stats.records_inserted += summary.inserted;
        stats.last_run = Some(summary.clone());
    }
}
