//! CLI command implementations.

pub mod daemon;
pub mod entities;
pub mod status;
pub mod sync;

use clap::Args;
use refsync_engine::{
    CatalogConfig, EntityType, HttpCatalogClient, ReqwestClient, RetryConfig, RunSummary,
    ScheduleConfig, SyncConfig, SyncEngine, SyncScheduler,
};
use refsync_store::{SqliteSink, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Scheduler wired to the HTTP catalog and the SQLite store.
pub type Scheduler = SyncScheduler<HttpCatalogClient<ReqwestClient>, SqliteSink>;

/// Remote catalog and run settings shared by `sync` and `daemon`.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Base URL of the catalog API
    #[arg(long, env = "REFSYNC_BASE_URL")]
    pub base_url: String,

    /// API user
    #[arg(long, env = "REFSYNC_USER")]
    pub user: String,

    /// API secret
    #[arg(long, env = "REFSYNC_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Pause between pages in milliseconds
    #[arg(long, default_value_t = 100)]
    pub page_delay_ms: u64,

    /// Attempts per page before it is skipped
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u32>,
}

impl RemoteArgs {
    fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::new(&self.base_url, &self.user, &self.secret)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    fn sync_config(&self) -> SyncConfig {
        let retry = if self.attempts > 1 {
            RetryConfig::new(self.attempts)
        } else {
            RetryConfig::no_retry()
        };
        let config = SyncConfig::new()
            .with_page_delay(Duration::from_millis(self.page_delay_ms))
            .with_retry(retry);
        match self.max_pages {
            Some(max) => config.with_max_pages(max),
            None => config,
        }
    }
}

/// Opens the store at `path`.
pub fn open_store(path: &Path) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    Ok(SqliteStore::open(path)?)
}

/// Builds a scheduler with one engine per entity type. Every finished run is
/// written to the store's run history.
pub fn scheduler(
    store: &SqliteStore,
    remote: &RemoteArgs,
    schedule: ScheduleConfig,
) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let client = Arc::new(HttpCatalogClient::with_reqwest(remote.catalog_config())?);
    let config = remote.sync_config();

    let history = store.clone();
    let scheduler = EntityType::ALL
        .into_iter()
        .fold(SyncScheduler::new(schedule), |scheduler, entity| {
            scheduler.with_engine(SyncEngine::new(
                entity,
                config.clone(),
                Arc::clone(&client),
                store.sink(entity),
            ))
        })
        .with_run_hook(Arc::new(move |summary: &RunSummary| {
            if let Err(e) = history.record_run(summary) {
                warn!(run_id = %summary.run_id, error = %e, "failed to record run");
            }
        }));

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RemoteArgs {
        RemoteArgs {
            base_url: "https://api.example.com".into(),
            user: "u".into(),
            secret: "s".into(),
            timeout_secs: 5,
            page_delay_ms: 0,
            attempts: 3,
            max_pages: Some(50),
        }
    }

    #[test]
    fn remote_args_map_to_configs() {
        let args = args();
        assert_eq!(args.catalog_config().timeout, Duration::from_secs(5));

        let config = args.sync_config();
        assert_eq!(config.page_delay, Duration::ZERO);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.max_pages, Some(50));
    }

    #[test]
    fn scheduler_covers_every_entity() {
        let store = SqliteStore::in_memory().unwrap();
        let scheduler = scheduler(&store, &args(), ScheduleConfig::default()).unwrap();
        assert_eq!(scheduler.entities(), EntityType::ALL.to_vec());
    }
}
