use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Harvest run behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Number of accepted items after which the run stops
    #[serde(rename = "max-items", default = "default_max_items")]
    pub max_items: u64,

    /// Reviews to collect for every accepted item (0 disables review fetching)
    #[serde(rename = "max-reviews", default = "default_max_reviews")]
    pub max_reviews: u32,

    /// Run the worker pool instead of a single sequential loop
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Size of the worker pool in parallel mode
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Number of items submitted to the pool per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Completed items between checkpoints
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Pause between batches (milliseconds)
    #[serde(rename = "batch-pause-ms", default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,

    /// Pause between review page fetches (milliseconds)
    #[serde(rename = "review-page-pause-ms", default = "default_review_page_pause_ms")]
    pub review_page_pause_ms: u64,
}

impl HarvestConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn review_page_pause(&self) -> Duration {
        Duration::from_millis(self.review_page_pause_ms)
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_reviews: default_max_reviews(),
            parallel: default_parallel(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            checkpoint_interval: default_checkpoint_interval(),
            batch_pause_ms: default_batch_pause_ms(),
            review_page_pause_ms: default_review_page_pause_ms(),
        }
    }
}

/// Quality criteria applied to fetched detail records
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Declared kind an item must have to be accepted
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Category id that excludes an item (downloadable content)
    #[serde(rename = "excluded-category", default = "default_excluded_category")]
    pub excluded_category: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            excluded_category: default_excluded_category(),
        }
    }
}

/// Remote API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Full URL of the catalog listing endpoint
    #[serde(rename = "catalog-url", default = "default_catalog_url")]
    pub catalog_url: String,

    /// Base URL of the store (detail and review endpoints)
    #[serde(rename = "store-url", default = "default_store_url")]
    pub store_url: String,

    /// Country code sent with detail requests
    #[serde(default = "default_country")]
    pub country: String,

    /// Language sent with detail requests
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            store_url: default_store_url(),
            country: default_country(),
            language: default_language(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Append-only JSONL file for accepted detail records
    #[serde(rename = "details-path")]
    pub details_path: String,

    /// Append-only JSONL file for review records
    #[serde(rename = "reviews-path")]
    pub reviews_path: String,

    /// Primary checkpoint file (`.backup` and `.tmp` siblings are derived)
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Field name injected into every output record carrying the item id
    #[serde(rename = "id-field", default = "default_id_field")]
    pub id_field: String,
}

/// Proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// File with comma or newline separated proxy endpoints
    #[serde(rename = "list-path")]
    pub list_path: Option<String>,
}

fn default_max_items() -> u64 {
    10
}

fn default_max_reviews() -> u32 {
    10
}

fn default_parallel() -> bool {
    true
}

fn default_workers() -> usize {
    8
}

fn default_batch_size() -> usize {
    100
}

fn default_checkpoint_interval() -> usize {
    25
}

fn default_batch_pause_ms() -> u64 {
    500
}

fn default_review_page_pause_ms() -> u64 {
    200
}

fn default_kind() -> String {
    "game".to_string()
}

fn default_excluded_category() -> u64 {
    21
}

fn default_catalog_url() -> String {
    "https://api.steampowered.com/ISteamApps/GetAppList/v2".to_string()
}

fn default_store_url() -> String {
    "https://store.steampowered.com".to_string()
}

fn default_country() -> String {
    "us".to_string()
}

fn default_language() -> String {
    "english".to_string()
}

fn default_id_field() -> String {
    "appid".to_string()
}
