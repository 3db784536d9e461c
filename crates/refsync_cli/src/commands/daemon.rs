//! Daemon command implementation.

use super::RemoteArgs;
use chrono::NaiveTime;
use refsync_engine::ScheduleConfig;
use refsync_store::SqliteStore;
use std::sync::Arc;
use tracing::info;

/// Runs the daemon until the scheduler stops or Ctrl-C is received.
pub async fn run(
    store: &SqliteStore,
    remote: &RemoteArgs,
    daily_at: &str,
    sync_on_startup: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let at = parse_daily_at(daily_at)?;
    let schedule = ScheduleConfig::new(at).with_sync_on_startup(sync_on_startup);
    let scheduler = Arc::new(super::scheduler(store, remote, schedule)?);

    info!(daily_at = %at, sync_on_startup, "daemon started");
    let mut handle = scheduler.start();

    tokio::select! {
        result = &mut handle => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutting down");
            handle.abort();
        }
    }
    Ok(())
}

fn parse_daily_at(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
}
