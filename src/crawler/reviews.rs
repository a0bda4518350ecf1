//! Cursor-driven review pagination

use crate::control::RunControl;
use crate::crawler::catalog::CatalogApi;
use serde_json::Value;
use std::time::Duration;

/// Upper bound on pages fetched per item
pub const MAX_REVIEW_PAGES: u32 = 10;

/// Largest page the review endpoint serves
pub const REVIEWS_PER_PAGE: u32 = 100;

/// Cursor that starts a review stream
pub const INITIAL_CURSOR: &str = "*";

/// Number of pages needed for `wanted` reviews, capped at [`MAX_REVIEW_PAGES`]
pub fn page_budget(wanted: u32) -> u32 {
    wanted.div_ceil(REVIEWS_PER_PAGE).min(MAX_REVIEW_PAGES)
}

/// Collects up to `wanted` reviews for one item
///
/// Pagination ends at the page budget, on a failed or empty page, when the
/// server sends no cursor or repeats the one it was given, or when the run
/// is stopping. `pause` is slept between consecutive page requests.
pub async fn collect_reviews<A: CatalogApi>(
    api: &A,
    id: u64,
    wanted: u32,
    control: &RunControl,
    pause: Duration,
) -> Vec<Value> {
    let wanted_len = wanted as usize;
    let max_pages = page_budget(wanted);
    let mut reviews: Vec<Value> = Vec::new();
    let mut cursor = INITIAL_CURSOR.to_string();

    for page in 0..max_pages {
        if control.should_stop() || reviews.len() >= wanted_len {
            break;
        }

        let count = (wanted_len - reviews.len()).min(REVIEWS_PER_PAGE as usize) as u32;
        let Some(next) = api.fetch_review_page(id, &cursor, count).await else {
            tracing::debug!("Item {}: review page {} unavailable", id, page + 1);
            break;
        };

        if next.reviews.is_empty() {
            break;
        }
        reviews.extend(next.reviews);

        match next.cursor {
            Some(next_cursor) if next_cursor != cursor => cursor = next_cursor,
            _ => break,
        }

        let more = page + 1 < max_pages && reviews.len() < wanted_len;
        if more && !control.sleep(pause).await {
            break;
        }
    }

    reviews.truncate(wanted_len);
    reviews
}
