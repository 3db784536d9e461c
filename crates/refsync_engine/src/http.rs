//! HTTP catalog client.
//!
//! The listing endpoint is `GET <base>/<entity-path>?user=..&secret=..&page=N`
//! and answers with a JSON object whose `results` array holds the records.
//! The raw HTTP layer is abstracted behind [`HttpClient`] so the decoding
//! logic can be exercised without a network.

use crate::client::CatalogClient;
use crate::config::CatalogConfig;
use crate::entity::EntityType;
use crate::error::{SyncError, SyncResult};
use crate::record::Page;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// HTTP client abstraction.
///
/// Implementations perform exactly one GET and return the response body of
/// a successful (2xx) response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request with the given query parameters.
    async fn get(&self, url: &str, query: &[(&str, String)]) -> SyncResult<Vec<u8>>;
}

/// Listing response body. Only `results` is read.
#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,
}

/// Catalog client speaking the remote listing API over HTTP.
pub struct HttpCatalogClient<C: HttpClient> {
    config: CatalogConfig,
    client: C,
}

impl<C: HttpClient> HttpCatalogClient<C> {
    /// Creates a catalog client over an HTTP implementation.
    pub fn new(config: CatalogConfig, client: C) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Returns the catalog configuration.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn query(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("user", self.config.user.clone()),
            ("secret", self.config.secret.clone()),
            ("page", page.to_string()),
        ]
    }
}

impl HttpCatalogClient<ReqwestClient> {
    /// Creates a catalog client backed by `reqwest` using the configured timeout.
    pub fn with_reqwest(config: CatalogConfig) -> SyncResult<Self> {
        let client = ReqwestClient::new(&config)?;
        Self::new(config, client)
    }
}

/// Decodes a listing body into a page. A missing or null `results` is an
/// empty page.
pub fn decode_listing(index: u32, body: &[u8]) -> SyncResult<Page> {
    let response: ListingResponse =
        serde_json::from_slice(body).map_err(|e| SyncError::Decode(e.to_string()))?;
    Ok(Page::from_values(index, response.results.unwrap_or_default()))
}

#[async_trait]
impl<C: HttpClient> CatalogClient for HttpCatalogClient<C> {
    async fn fetch_page(&self, entity: EntityType, page: u32) -> SyncResult<Page> {
        let url = self.config.endpoint(entity.remote_path());
        let body = self.client.get(&url, &self.query(page)).await?;
        let decoded = decode_listing(page, &body)?;
        debug!(
            entity = %entity,
            page,
            records = decoded.len(),
            dropped = decoded.dropped,
            "fetched catalog page"
        );
        Ok(decoded)
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client with the configured request timeout.
    pub fn new(config: &CatalogConfig) -> SyncResult<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("refsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { inner })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else if let Some(status) = err.status() {
        SyncError::Http {
            status: status.as_u16(),
        }
    } else if err.is_builder() {
        SyncError::transport_fatal(err.to_string())
    } else {
        SyncError::transport_retryable(err.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, query: &[(&str, String)]) -> SyncResult<Vec<u8>> {
        let response = self
            .inner
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(body.to_vec())
    }
}
