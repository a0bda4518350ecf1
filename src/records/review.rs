//! Review record decoration
//!
//! Derived fields are computed once, when a review is written, so consumers
//! of the review file never recompute them.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fields derived from a raw review payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewMetrics {
    pub word_count: usize,
    pub char_count: usize,
    pub created_date: String,
    pub updated_date: String,
    pub was_updated: bool,
}

impl ReviewMetrics {
    /// Computes metrics from the `review`, `timestamp_created` and
    /// `timestamp_updated` fields
    pub fn from_review(review: &Value) -> Self {
        let text = review
            .get("review")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        let created = timestamp(review, "timestamp_created");
        let updated = timestamp(review, "timestamp_updated");

        Self {
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            created_date: format_date(created),
            updated_date: format_date(updated),
            was_updated: updated > created,
        }
    }
}

fn timestamp(review: &Value, field: &str) -> i64 {
    review.get(field).and_then(Value::as_i64).unwrap_or(0)
}

/// Formats a unix timestamp as a UTC `YYYY-MM-DD` date; 0 yields ""
fn format_date(seconds: i64) -> String {
    if seconds == 0 {
        return String::new();
    }
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Injects the owning id and the derived metrics into a review record
pub fn decorate_review(review: Value, id_field: &str, id: u64) -> Value {
    let metrics = ReviewMetrics::from_review(&review);
    let mut record = super::decorate_with_id(review, id_field, id);

    if let Value::Object(map) = &mut record {
        map.insert("review_word_count".to_string(), metrics.word_count.into());
        map.insert("review_char_count".to_string(), metrics.char_count.into());
        map.insert("created_date".to_string(), metrics.created_date.into());
        map.insert("updated_date".to_string(), metrics.updated_date.into());
        map.insert("was_updated".to_string(), metrics.was_updated.into());
    }
    record
}
