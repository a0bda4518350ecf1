//! Remote catalog access
//!
//! [`CatalogApi`] is the seam between the harvesting engine and the remote
//! store: the engine only ever lists the catalog, fetches one detail payload
//! and fetches review pages. [`SteamCatalog`] implements it over HTTP.

use crate::config::ApiConfig;
use crate::control::RunControl;
use crate::crawler::fetcher::{FetchRequest, Fetcher};
use crate::proxy::ProxyPool;
use crate::state::WorkItem;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Outer attempts when listing the catalog
const CATALOG_ATTEMPTS: u32 = 3;

/// Proxy draws per detail fetch
const DETAIL_ATTEMPTS: u32 = 4;

const CATALOG_TIMEOUT: Duration = Duration::from_secs(30);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(12);
const REVIEW_TIMEOUT: Duration = Duration::from_secs(12);

/// One page of reviews
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPage {
    pub reviews: Vec<Value>,
    /// Cursor for the next page; absent at end of stream
    pub cursor: Option<String>,
}

/// Read access to a remote catalog
///
/// Every operation is soft-failing: transport trouble, decode errors and
/// unavailable items all surface as empty results, never as errors.
pub trait CatalogApi: Send + Sync + 'static {
    /// Lists every item in the catalog
    fn list_catalog(&self) -> impl Future<Output = Vec<WorkItem>> + Send;

    /// Fetches the detail payload of one item
    ///
    /// `None` means the item is unavailable or could not be fetched.
    fn fetch_detail(&self, id: u64) -> impl Future<Output = Option<Value>> + Send;

    /// Fetches one page of reviews starting at `cursor`
    ///
    /// `None` means the page could not be fetched or decoded.
    fn fetch_review_page(
        &self,
        id: u64,
        cursor: &str,
        count: u32,
    ) -> impl Future<Output = Option<ReviewPage>> + Send;
}

/// Interprets a JSON `success` flag given as a bool or a number
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
        _ => false,
    }
}

/// Extracts `{id, name}` pairs from a catalog listing payload
///
/// Entries without a positive integer id are skipped.
pub fn parse_catalog(payload: &Value) -> Vec<WorkItem> {
    let Some(apps) = payload
        .get("applist")
        .and_then(|list| list.get("apps"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    apps.iter()
        .filter_map(|app| {
            let id = app.get("appid").and_then(Value::as_u64).filter(|id| *id > 0)?;
            let name = app.get("name").and_then(Value::as_str).unwrap_or_default();
            Some(WorkItem::new(id, name))
        })
        .collect()
}

/// Extracts the detail record for `id` from an appdetails payload
///
/// Returns `None` when the entry is missing or not marked successful.
pub fn parse_detail(mut payload: Value, id: u64) -> Option<Value> {
    let entry = payload.get_mut(id.to_string())?;
    if !is_truthy(entry.get("success")) {
        return None;
    }
    entry.get_mut("data").map(Value::take).filter(|data| !data.is_null())
}

/// Extracts a review page from an appreviews payload
///
/// An unsuccessful response reads as an empty page with no cursor.
pub fn parse_review_page(mut payload: Value) -> ReviewPage {
    if !is_truthy(payload.get("success")) {
        return ReviewPage::default();
    }

    let reviews = match payload.get_mut("reviews").map(Value::take) {
        Some(Value::Array(reviews)) => reviews,
        _ => Vec::new(),
    };
    let cursor = payload
        .get("cursor")
        .and_then(Value::as_str)
        .filter(|cursor| !cursor.is_empty())
        .map(str::to_string);

    ReviewPage { reviews, cursor }
}

/// Steam-style store API reached over HTTP
pub struct SteamCatalog {
    api: ApiConfig,
    fetcher: Fetcher,
    proxies: Arc<ProxyPool>,
}

impl SteamCatalog {
    pub fn new(api: ApiConfig, fetcher: Fetcher, proxies: Arc<ProxyPool>) -> Self {
        Self {
            api,
            fetcher,
            proxies,
        }
    }

    fn control(&self) -> &RunControl {
        self.fetcher.control()
    }

    fn store_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api.store_url.trim_end_matches('/'), path)
    }
}

impl CatalogApi for SteamCatalog {
    async fn list_catalog(&self) -> Vec<WorkItem> {
        for attempt in 0..CATALOG_ATTEMPTS {
            if self.control().should_stop() {
                break;
            }

            let request = FetchRequest::new(&self.api.catalog_url)
                .timeout(CATALOG_TIMEOUT)
                .attempts(2);

            if let Some(body) = self.fetcher.fetch(request).await {
                match serde_json::from_str::<Value>(&body) {
                    Ok(payload) => {
                        let items = parse_catalog(&payload);
                        tracing::info!("{} items listed in the catalog", items.len());
                        return items;
                    }
                    Err(e) => tracing::error!("Failed to decode catalog listing: {}", e),
                }
            }

            if attempt + 1 < CATALOG_ATTEMPTS {
                let wait = Duration::from_secs(5 * u64::from(attempt + 1));
                tracing::warn!(
                    "Catalog attempt {} failed, waiting {}s",
                    attempt + 1,
                    wait.as_secs()
                );
                if !self.control().sleep(wait).await {
                    break;
                }
            }
        }

        tracing::error!("Failed to list the catalog after {} attempts", CATALOG_ATTEMPTS);
        Vec::new()
    }

    async fn fetch_detail(&self, id: u64) -> Option<Value> {
        let url = self.store_endpoint("api/appdetails");

        for _ in 0..DETAIL_ATTEMPTS {
            if self.control().should_stop() {
                return None;
            }

            let endpoint = self.proxies.next();
            let request = FetchRequest::new(&url)
                .param("appids", id)
                .param("cc", &self.api.country)
                .param("l", &self.api.language)
                .timeout(DETAIL_TIMEOUT)
                .proxy(self.proxies.settings_for(&endpoint))
                .attempts(1);

            let Some(body) = self.fetcher.fetch(request).await else {
                tracing::debug!("Item {}: no response via {}", id, endpoint);
                if !self.control().should_stop() {
                    self.proxies.mark_failed(&endpoint);
                }
                continue;
            };

            match serde_json::from_str::<Value>(&body) {
                Ok(payload) => return parse_detail(payload, id),
                Err(e) => {
                    tracing::debug!("Item {}: invalid JSON via {}: {}", id, endpoint, e);
                    self.proxies.mark_failed(&endpoint);
                }
            }
        }

        None
    }

    async fn fetch_review_page(&self, id: u64, cursor: &str, count: u32) -> Option<ReviewPage> {
        let endpoint = self.proxies.next();
        let request = FetchRequest::new(self.store_endpoint(&format!("appreviews/{}", id)))
            .param("json", 1)
            .param("purchase_type", "all")
            .param("num_per_page", count)
            .param("cursor", cursor)
            .param("filter", "recent")
            .timeout(REVIEW_TIMEOUT)
            .proxy(self.proxies.settings_for(&endpoint))
            .attempts(1);

        let Some(body) = self.fetcher.fetch(request).await else {
            if !self.control().should_stop() {
                self.proxies.mark_failed(&endpoint);
            }
            return None;
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => Some(parse_review_page(payload)),
            Err(e) => {
                tracing::debug!("Item {}: invalid review page: {}", id, e);
                None
            }
        }
    }
}
