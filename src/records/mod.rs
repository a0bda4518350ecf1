//! Record handling for harvested payloads
//!
//! This module validates detail payloads against the quality filter and
//! shapes both detail and review payloads into output lines:
//! - `DetailFilter`: the accept/reject decision for a detail record
//! - `decorate_with_id`: injects the owning id into any record
//! - `decorate_review`: adds derived review fields at write time

mod detail;
mod review;

pub use detail::{decorate_with_id, display_name, DetailFilter, Rejection};
pub use review::{decorate_review, ReviewMetrics};
