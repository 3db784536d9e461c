//! Status command implementation.

use refsync_engine::EntityType;
use refsync_store::{RunRecord, SqliteStore};
use serde::Serialize;
use std::path::Path;

/// Stored state of the local copy.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Database path.
    pub path: String,
    /// Record count per entity type.
    pub entities: Vec<EntityStatus>,
    /// Most recent runs, newest first.
    pub recent_runs: Vec<RunRecord>,
}

/// Record count for one entity type.
#[derive(Debug, Serialize)]
pub struct EntityStatus {
    /// Entity type.
    pub entity: EntityType,
    /// Stored records.
    pub records: u64,
    /// Start time of the last completed run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<String>,
}

/// Runs the status command.
pub fn run(
    store: &SqliteStore,
    path: &Path,
    limit: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = collect(store, path, limit)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Database: {}", report.path);
    println!();
    for status in &report.entities {
        println!(
            "  {:<12} {:>8} records   last completed: {}",
            status.entity.name(),
            status.records,
            status.last_completed.as_deref().unwrap_or("never")
        );
    }

    if !report.recent_runs.is_empty() {
        println!();
        println!("Recent runs:");
        for run in &report.recent_runs {
            println!(
                "  {}  {:<12} {:<9} inserted={:<7} pages={:<5} {}ms",
                run.started_at,
                run.entity,
                if run.completed { "completed" } else { "aborted" },
                run.inserted,
                run.pages_attempted,
                run.duration_ms
            );
        }
    }
    Ok(())
}

fn collect(
    store: &SqliteStore,
    path: &Path,
    limit: usize,
) -> Result<StatusReport, Box<dyn std::error::Error>> {
    let mut entities = Vec::with_capacity(EntityType::ALL.len());
    for entity in EntityType::ALL {
        let last_completed = store
            .recent_runs(Some(entity), 50)?
            .into_iter()
            .find(|run| run.completed)
            .map(|run| run.started_at);
        entities.push(EntityStatus {
            entity,
            records: store.count(entity)?,
            last_completed,
        });
    }

    Ok(StatusReport {
        path: path.display().to_string(),
        entities,
        recent_runs: store.recent_runs(None, limit)?,
    })
}
