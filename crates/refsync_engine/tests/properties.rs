//! Property tests for run termination, uniqueness and completeness.

use proptest::prelude::*;
use refsync_engine::{
    EntityType, MemorySink, MockCatalogClient, RunSummary, SyncConfig, SyncEngine,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const E: EntityType = EntityType::Stage;

fn run_pages(pages: &[Vec<u8>]) -> (RunSummary, Vec<String>, usize) {
    let client = MockCatalogClient::new();
    for (i, ids) in pages.iter().enumerate() {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        client.set_page_ids(E, i as u32 + 1, &refs);
    }

    let engine = SyncEngine::new(
        E,
        SyncConfig::new().with_page_delay(Duration::ZERO),
        Arc::new(client),
        MemorySink::new(),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let summary = runtime.block_on(engine.run());
    (summary, engine.sink().ids(), engine.client().call_count())
}

/// Ids expected in the store: pages are consumed until the first empty page
/// or the first page whose ids were all seen before.
fn expected_ids(pages: &[Vec<u8>]) -> (HashSet<String>, usize) {
    let mut seen = HashSet::new();
    for (i, page) in pages.iter().enumerate() {
        if page.is_empty() {
            return (seen, i + 1);
        }
        let fresh: Vec<_> = page.iter().filter(|id| !seen.contains(&id.to_string())).collect();
        if fresh.is_empty() {
            return (seen, i + 1);
        }
        seen.extend(fresh.into_iter().map(|id| id.to_string()));
    }
    // The page after the last scripted one is served empty.
    (seen, pages.len() + 1)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn stored_ids_are_unique(pages in prop::collection::vec(prop::collection::vec(0u8..40, 0..8), 0..10)) {
        let (summary, ids, _) = run_pages(&pages);
        prop_assert!(summary.is_completed());

        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
        prop_assert_eq!(summary.inserted as usize, ids.len());
    }

    #[test]
    fn run_terminates_and_stores_union(pages in prop::collection::vec(prop::collection::vec(0u8..40, 0..8), 0..10)) {
        let (_, ids, calls) = run_pages(&pages);
        let (expected, expected_calls) = expected_ids(&pages);

        prop_assert_eq!(calls, expected_calls);
        prop_assert_eq!(ids.into_iter().collect::<HashSet<_>>(), expected);
    }
}
