//! Triggers that start sync runs.
//!
//! Runs start on process startup (only for entity types with an empty
//! store), on a fixed daily schedule, or on operator request. The scheduler
//! holds one engine per entity type and guarantees at most one run per
//! entity type at a time.

use crate::client::CatalogClient;
use crate::config::ScheduleConfig;
use crate::engine::{RunSummary, SyncEngine};
use crate::entity::EntityType;
use crate::error::{SyncError, SyncResult};
use crate::sink::Sink;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Startup check found the store empty.
    Startup,
    /// Daily schedule fired.
    Daily,
    /// Operator request.
    Manual,
}

struct Slot<C: CatalogClient, S: Sink> {
    engine: SyncEngine<C, S>,
    running: Mutex<()>,
}

/// Callback invoked with every finished run.
pub type RunHook = Arc<dyn Fn(&RunSummary) + Send + Sync>;

/// Owns the per-entity engines and serializes their runs.
pub struct SyncScheduler<C: CatalogClient, S: Sink> {
    slots: BTreeMap<EntityType, Slot<C, S>>,
    schedule: ScheduleConfig,
    on_run: Option<RunHook>,
}

impl<C: CatalogClient, S: Sink> SyncScheduler<C, S> {
    /// Creates a scheduler with no engines.
    pub fn new(schedule: ScheduleConfig) -> Self {
        Self {
            slots: BTreeMap::new(),
            schedule,
            on_run: None,
        }
    }

    /// Registers the engine for its entity type, replacing any previous one.
    pub fn with_engine(mut self, engine: SyncEngine<C, S>) -> Self {
        self.slots.insert(
            engine.entity(),
            Slot {
                engine,
                running: Mutex::new(()),
            },
        );
        self
    }

    /// Sets a callback run after every finished run, whatever its trigger.
    pub fn with_run_hook(mut self, hook: RunHook) -> Self {
        self.on_run = Some(hook);
        self
    }

    /// Schedule configuration.
    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Registered entity types.
    pub fn entities(&self) -> Vec<EntityType> {
        self.slots.keys().copied().collect()
    }

    /// The engine for an entity type.
    pub fn engine(&self, entity: EntityType) -> Option<&SyncEngine<C, S>> {
        self.slots.get(&entity).map(|slot| &slot.engine)
    }

    fn slot(&self, entity: EntityType) -> SyncResult<&Slot<C, S>> {
        self.slots
            .get(&entity)
            .ok_or_else(|| SyncError::UnknownEntity(entity.to_string()))
    }

    /// Runs a sync for `entity` and waits for it.
    ///
    /// A manual trigger is refused with [`SyncError::RunInProgress`] if a run
    /// is already active; scheduled triggers wait for it to finish instead.
    pub async fn run_now(&self, entity: EntityType, kind: TriggerKind) -> SyncResult<RunSummary> {
        let slot = self.slot(entity)?;
        let _guard = match kind {
            TriggerKind::Manual => slot
                .running
                .try_lock()
                .map_err(|_| SyncError::RunInProgress(entity))?,
            TriggerKind::Startup | TriggerKind::Daily => slot.running.lock().await,
        };

        info!(entity = %entity, trigger = ?kind, "sync triggered");
        let summary = slot.engine.run().await;
        if let Some(hook) = &self.on_run {
            hook(&summary);
        }
        Ok(summary)
    }

    /// Runs every registered entity type in turn.
    pub async fn run_all(&self, kind: TriggerKind) -> Vec<SyncResult<RunSummary>> {
        let mut results = Vec::with_capacity(self.slots.len());
        for entity in self.entities() {
            results.push(self.run_now(entity, kind).await);
        }
        results
    }

    /// Syncs every entity type whose store is currently empty.
    ///
    /// Entity types whose count cannot be read are skipped with a warning.
    pub async fn sync_if_empty(&self) -> Vec<RunSummary> {
        let mut summaries = Vec::new();
        for (entity, slot) in &self.slots {
            match slot.engine.sink().count().await {
                Ok(0) => match self.run_now(*entity, TriggerKind::Startup).await {
                    Ok(summary) => summaries.push(summary),
                    Err(e) => warn!(entity = %entity, error = %e, "startup sync failed"),
                },
                Ok(count) => {
                    info!(entity = %entity, count, "store populated, skipping startup sync");
                }
                Err(e) => {
                    warn!(entity = %entity, error = %e, "could not count stored records");
                }
            }
        }
        summaries
    }

    /// Sleeps until each daily slot and syncs every entity type. Never returns.
    pub async fn run_daily(&self) {
        loop {
            let now = Utc::now();
            let next = next_daily_run(now, self.schedule.daily_at);
            info!(next_run = %next, "next daily sync scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            for result in self.run_all(TriggerKind::Daily).await {
                if let Err(e) = result {
                    warn!(error = %e, "daily sync failed");
                }
            }
        }
    }
}

impl<C, S> SyncScheduler<C, S>
where
    C: CatalogClient + 'static,
    S: Sink + 'static,
{
    /// Starts a run in the background without waiting for it.
    pub fn spawn(
        self: &Arc<Self>,
        entity: EntityType,
        kind: TriggerKind,
    ) -> JoinHandle<SyncResult<RunSummary>> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.run_now(entity, kind).await })
    }

    /// Runs the startup check (if enabled), then the daily schedule forever.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.schedule.sync_on_startup {
                self.sync_if_empty().await;
            }
            self.run_daily().await;
        })
    }
}

/// Next occurrence of `at` (UTC) strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}
