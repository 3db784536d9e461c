//! End-to-end runs of the engine against scripted catalogs.

use refsync_engine::{
    AbortReason, EntityType, MemorySink, MockCatalogClient, Record, RunOutcome, RunSummary,
    ScheduleConfig, StopReason, SyncConfig, SyncEngine, SyncScheduler, TriggerKind,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const E: EntityType = EntityType::Competition;

fn engine_for(client: MockCatalogClient) -> SyncEngine<MockCatalogClient, MemorySink> {
    SyncEngine::new(
        E,
        SyncConfig::new().with_page_delay(Duration::ZERO),
        Arc::new(client),
        MemorySink::new(),
    )
}

fn stored_ids(engine: &SyncEngine<MockCatalogClient, MemorySink>) -> Vec<String> {
    let mut ids = engine.sink().ids();
    ids.sort();
    ids
}

fn assert_completed(summary: &RunSummary, stop: StopReason) {
    assert_eq!(summary.outcome, RunOutcome::Completed { stop });
}

#[tokio::test]
async fn overlapping_second_page_then_empty() {
    let client = MockCatalogClient::new();
    client.set_page_ids(E, 1, &["1", "2", "3"]);
    client.set_page_ids(E, 2, &["3", "4", "5"]);

    let engine = engine_for(client);
    let summary = engine.run().await;

    assert_completed(&summary, StopReason::EmptyPage);
    assert_eq!(summary.fetch_attempts, 3);
    assert_eq!(summary.inserted, 5);
    assert_eq!(engine.sink().batch_count(), 2);
    assert_eq!(stored_ids(&engine), vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn empty_first_page_leaves_store_empty() {
    let engine = SyncEngine::new(
        E,
        SyncConfig::new().with_page_delay(Duration::ZERO),
        Arc::new(MockCatalogClient::new()),
        MemorySink::with_records(vec![Record::new("previous", json!({"id": "previous"}))]),
    );
    let summary = engine.run().await;

    assert_completed(&summary, StopReason::EmptyPage);
    assert_eq!(summary.fetch_attempts, 1);
    assert_eq!(summary.inserted, 0);
    assert_eq!(engine.sink().batch_count(), 0);
    assert!(engine.sink().ids().is_empty());
}

#[tokio::test]
async fn repeated_page_is_end_of_data() {
    let client = MockCatalogClient::new();
    client.set_page_ids(E, 1, &["7", "8"]);
    client.set_page_ids(E, 2, &["7", "8"]);

    let engine = engine_for(client);
    let summary = engine.run().await;

    assert_completed(&summary, StopReason::DuplicatePage);
    assert_eq!(summary.fetch_attempts, 2);
    assert_eq!(engine.sink().batch_count(), 1);
    assert_eq!(stored_ids(&engine), vec!["7", "8"]);
}

#[tokio::test]
async fn eleven_failed_pages_abort() {
    let client = MockCatalogClient::new();
    for page in 1..=11 {
        client.fail_page(E, page, "connection refused");
    }
    client.set_page_ids(E, 12, &["never"]);

    let engine = engine_for(client);
    let summary = engine.run().await;

    assert_eq!(
        summary.outcome,
        RunOutcome::Aborted {
            reason: AbortReason::FetchBudgetExhausted {
                consecutive_failures: 11
            }
        }
    );
    assert_eq!(summary.fetch_attempts, 11);
    assert_eq!(summary.inserted, 0);
    assert_eq!(engine.client().call_count(), 11);
}

#[tokio::test]
async fn repeated_runs_are_idempotent() {
    let client = MockCatalogClient::new();
    client.set_page_ids(E, 1, &["a", "b", "c"]);
    client.set_page_ids(E, 2, &["c", "d"]);
    client.set_page_ids(E, 3, &["e"]);

    let engine = engine_for(client);
    engine.run().await;
    let first = engine.sink().records();
    engine.run().await;
    let second = engine.sink().records();

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
}

#[tokio::test]
async fn payloads_pass_through_unchanged() {
    let client = MockCatalogClient::new();
    let payload = json!({"id": "42", "name": "Central Park", "capacity": 1200, "tags": ["outdoor"]});
    client.set_page(E, 1, vec![Record::new("42", payload.clone())]);

    let engine = engine_for(client);
    engine.run().await;

    assert_eq!(engine.sink().records()[0].payload, payload);
}

#[tokio::test]
async fn scheduler_runs_each_entity_against_its_own_sink() {
    let client = Arc::new(MockCatalogClient::new());
    client.set_page_ids(EntityType::Player, 1, &["p1", "p2"]);
    client.set_page_ids(EntityType::Stage, 1, &["s1"]);

    let config = SyncConfig::new().with_page_delay(Duration::ZERO);
    let scheduler = SyncScheduler::new(ScheduleConfig::default())
        .with_engine(SyncEngine::new(
            EntityType::Player,
            config.clone(),
            Arc::clone(&client),
            MemorySink::new(),
        ))
        .with_engine(SyncEngine::new(
            EntityType::Stage,
            config,
            Arc::clone(&client),
            MemorySink::new(),
        ));

    let summaries = scheduler.sync_if_empty().await;
    assert_eq!(summaries.len(), 2);

    let players = scheduler.engine(EntityType::Player).unwrap().sink();
    let stages = scheduler.engine(EntityType::Stage).unwrap().sink();
    assert_eq!(players.ids(), vec!["p1", "p2"]);
    assert_eq!(stages.ids(), vec!["s1"]);

    // Both stores are populated now, so a second startup check is a no-op.
    client.reset_calls();
    assert!(scheduler.sync_if_empty().await.is_empty());
    assert_eq!(client.call_count(), 0);

    let summary = scheduler
        .run_now(EntityType::Player, TriggerKind::Manual)
        .await
        .unwrap();
    assert_eq!(summary.inserted, 2);
}
