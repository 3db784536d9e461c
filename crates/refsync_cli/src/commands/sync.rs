//! Sync command implementation.

use super::RemoteArgs;
use refsync_engine::{
    AbortReason, EntityType, RunOutcome, RunSummary, ScheduleConfig, StopReason, SyncResult,
    TriggerKind,
};
use refsync_store::SqliteStore;

/// Runs the sync command.
pub async fn run(
    store: &SqliteStore,
    remote: &RemoteArgs,
    target: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let entities = parse_target(target)?;
    let scheduler = super::scheduler(store, remote, ScheduleConfig::default())?;

    let mut summaries = Vec::with_capacity(entities.len());
    for entity in entities {
        summaries.push(scheduler.run_now(entity, TriggerKind::Manual).await?);
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            print_summary(summary);
        }
    }

    let aborted = summaries.iter().filter(|s| s.is_aborted()).count();
    if aborted > 0 {
        return Err(format!("{aborted} of {} runs aborted", summaries.len()).into());
    }
    Ok(())
}

fn parse_target(target: &str) -> SyncResult<Vec<EntityType>> {
    if target.trim().eq_ignore_ascii_case("all") {
        Ok(EntityType::ALL.to_vec())
    } else {
        Ok(vec![target.parse()?])
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{:<12} {:<28} inserted={:<7} pages={:<5} failed={:<3} {:.1}s",
        summary.entity.name(),
        describe(&summary.outcome),
        summary.inserted,
        summary.pages_attempted,
        summary.failed_pages,
        summary.duration.as_secs_f64()
    );
}

fn describe(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed { stop } => match stop {
            StopReason::EmptyPage => "completed (empty page)".into(),
            StopReason::DuplicatePage => "completed (repeated page)".into(),
            StopReason::PageLimit => "completed (page limit)".into(),
        },
        RunOutcome::Aborted { reason } => match reason {
            AbortReason::ClearFailed { .. } => "aborted (clear failed)".into(),
            AbortReason::FetchBudgetExhausted {
                consecutive_failures,
            } => format!("aborted ({consecutive_failures} failed pages)"),
            AbortReason::InsertFailed { page, .. } => format!("aborted (insert, page {page})"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_and_single() {
        assert_eq!(parse_target("all").unwrap().len(), 4);
        assert_eq!(parse_target(" ALL ").unwrap().len(), 4);
        assert_eq!(parse_target("venues").unwrap(), vec![EntityType::Venue]);
        assert!(parse_target("teams").is_err());
    }

    #[test]
    fn describe_outcomes() {
        assert_eq!(
            describe(&RunOutcome::Completed {
                stop: StopReason::DuplicatePage
            }),
            "completed (repeated page)"
        );
        assert_eq!(
            describe(&RunOutcome::Aborted {
                reason: AbortReason::FetchBudgetExhausted {
                    consecutive_failures: 11
                }
            }),
            "aborted (11 failed pages)"
        );
    }
}
