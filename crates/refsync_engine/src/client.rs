//! Remote catalog client abstraction.

use crate::entity::EntityType;
use crate::error::{SyncError, SyncResult};
use crate::record::{Page, Record};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Fetches one page of a remote catalog listing.
///
/// A call is a single request. Implementations must not retry internally
/// and must not return partial data on failure; retry policy belongs to the
/// engine.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetches page `page` (1-based) of the listing for `entity`.
    async fn fetch_page(&self, entity: EntityType, page: u32) -> SyncResult<Page>;
}

#[async_trait]
impl<C: CatalogClient + ?Sized> CatalogClient for std::sync::Arc<C> {
    async fn fetch_page(&self, entity: EntityType, page: u32) -> SyncResult<Page> {
        (**self).fetch_page(entity, page).await
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Records(Vec<Record>),
    Raw(Vec<Value>),
    Fail { message: String, retryable: bool },
}

/// A scripted catalog client for testing.
///
/// Pages are scripted per entity type and page index. A page with no script
/// is served empty. Failures can be scripted to happen a limited number of
/// times so retry behavior can be exercised.
#[derive(Debug, Default)]
pub struct MockCatalogClient {
    pages: Mutex<HashMap<(EntityType, u32), Vec<Scripted>>>,
    calls: Mutex<Vec<(EntityType, u32)>>,
}

impl MockCatalogClient {
    /// Creates a client that serves only empty pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the records served for a page.
    pub fn set_page(&self, entity: EntityType, page: u32, records: Vec<Record>) {
        self.pages
            .lock()
            .insert((entity, page), vec![Scripted::Records(records)]);
    }

    /// Scripts a page containing records with the given ids.
    pub fn set_page_ids(&self, entity: EntityType, page: u32, ids: &[&str]) {
        let records = ids
            .iter()
            .map(|id| Record::new(*id, serde_json::json!({ "id": id, "page": page })))
            .collect();
        self.set_page(entity, page, records);
    }

    /// Scripts a page from raw remote objects, as the HTTP client would
    /// decode them. Items without a usable id are dropped.
    pub fn set_raw_page(&self, entity: EntityType, page: u32, values: Vec<Value>) {
        self.pages
            .lock()
            .insert((entity, page), vec![Scripted::Raw(values)]);
    }

    /// Scripts a page that always fails.
    pub fn fail_page(&self, entity: EntityType, page: u32, message: &str) {
        self.pages.lock().insert(
            (entity, page),
            vec![Scripted::Fail {
                message: message.to_string(),
                retryable: true,
            }],
        );
    }

    /// Scripts a page that fails `times` times, then serves `ids`.
    pub fn fail_page_then(&self, entity: EntityType, page: u32, times: usize, ids: &[&str]) {
        let mut script: Vec<Scripted> = (0..times)
            .map(|i| Scripted::Fail {
                message: format!("transient failure {}", i + 1),
                retryable: true,
            })
            .collect();
        script.push(Scripted::Records(
            ids.iter()
                .map(|id| Record::new(*id, serde_json::json!({ "id": id })))
                .collect(),
        ));
        self.pages.lock().insert((entity, page), script);
    }

    /// All fetches made so far, in order.
    pub fn calls(&self) -> Vec<(EntityType, u32)> {
        self.calls.lock().clone()
    }

    /// Number of fetches made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Forgets recorded calls.
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn fetch_page(&self, entity: EntityType, page: u32) -> SyncResult<Page> {
        self.calls.lock().push((entity, page));

        let mut pages = self.pages.lock();
        let step = match pages.get_mut(&(entity, page)) {
            // The last step is sticky; earlier steps are consumed.
            Some(script) if script.len() > 1 => Some(script.remove(0)),
            Some(script) => script.first().cloned(),
            None => None,
        };

        match step {
            Some(Scripted::Records(records)) => Ok(Page::new(page, records)),
            Some(Scripted::Raw(values)) => Ok(Page::from_values(page, values)),
            Some(Scripted::Fail { message, retryable }) => Err(SyncError::Transport {
                message,
                retryable,
            }),
            None => Ok(Page::empty(page)),
        }
    }
}
