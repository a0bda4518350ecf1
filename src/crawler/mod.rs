//! Crawler module for catalog harvesting
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry and backoff
//! - The remote catalog interface and its HTTP implementation
//! - Review pagination
//! - The per-item pipeline and overall run coordination

mod catalog;
mod coordinator;
mod fetcher;
mod reviews;
mod worker;

#[cfg(test)]
mod test_support;

pub use catalog::{parse_catalog, parse_detail, parse_review_page, CatalogApi, ReviewPage, SteamCatalog};
pub use coordinator::{harvest_catalog, run_harvest, HarvestSettings, Harvester};
pub use fetcher::{build_http_client, rate_limit_delay, retry_delay, FetchRequest, Fetcher, USER_AGENT};
pub use reviews::{collect_reviews, page_budget, MAX_REVIEW_PAGES, REVIEWS_PER_PAGE};
pub use worker::{announce_goal, process_item, HarvestContext, ItemOutcome, WorkerSettings};
