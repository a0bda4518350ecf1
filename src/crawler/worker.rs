//! Per-item harvesting pipeline
//!
//! One call to [`process_item`] drives a single work item from claim to a
//! terminal state: reserve, pre-check the goal, fetch the detail, validate,
//! admit against the goal counter, persist, collect reviews, and finally
//! mark the id processed.

use crate::config::Config;
use crate::control::{GoalCounter, RunControl};
use crate::crawler::catalog::CatalogApi;
use crate::crawler::reviews::collect_reviews;
use crate::output::RecordSink;
use crate::records::{decorate_review, decorate_with_id, display_name, DetailFilter, Rejection};
use crate::state::{CrawlState, WorkItem};
use std::sync::Arc;
use std::time::Duration;

/// Item-level knobs shared by every worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Reviews collected per accepted item; zero disables review fetching
    pub max_reviews: u32,

    /// Field name the item id is written under in both output files
    pub id_field: String,

    pub filter: DetailFilter,

    /// Pause between two review page requests
    pub review_page_pause: Duration,
}

impl From<&Config> for WorkerSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_reviews: config.harvest.max_reviews,
            id_field: config.output.id_field.clone(),
            filter: DetailFilter::from(&config.filter),
            review_page_pause: config.harvest.review_page_pause(),
        }
    }
}

/// Everything a worker needs, built once per run and shared by all tasks
pub struct HarvestContext<A> {
    pub api: A,
    pub state: Arc<CrawlState>,
    pub counter: Arc<GoalCounter>,
    pub control: Arc<RunControl>,
    pub details: Arc<dyn RecordSink>,
    pub reviews: Arc<dyn RecordSink>,
    pub settings: WorkerSettings,
}

/// How a single item ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Not started: already claimed, cancelled, or the run is stopping
    Skipped,

    /// The goal was already met after claiming; the reservation was released
    GoalReached,

    /// No detail payload could be obtained
    Unavailable,

    /// The detail payload failed validation
    Rejected(Rejection),

    /// The goal counter refused the item
    AdmissionRefused,

    /// Writing the detail record failed; the counter was compensated
    PersistFailed,

    /// The task ended abnormally; its guard recorded a failure
    Crashed,

    /// The item was stored as number `count` toward the goal
    Accepted { count: u64, reviews: usize },
}

impl ItemOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Owns one reservation until a terminal outcome is recorded
///
/// Dropping the guard without an outcome (an early return or a panic
/// unwinding through the pipeline) compensates the counter if this item
/// was counted and records the id as failed, so it never stays reserved.
struct ReservationGuard<'a> {
    id: u64,
    state: &'a CrawlState,
    counter: &'a GoalCounter,
    counted: bool,
    settled: bool,
}

impl<'a> ReservationGuard<'a> {
    fn acquire(state: &'a CrawlState, counter: &'a GoalCounter, id: u64) -> Option<Self> {
        state.reserve(id).then(|| Self {
            id,
            state,
            counter,
            counted: false,
            settled: false,
        })
    }

    fn mark_counted(&mut self) {
        self.counted = true;
    }

    /// Gives the id back without an outcome
    fn release(mut self) {
        self.state.release(self.id);
        self.settled = true;
    }

    /// Records a failure, compensating the counter if needed
    fn fail(mut self) {
        self.compensate();
        self.state.mark_processed(self.id, false);
        self.settled = true;
    }

    fn succeed(mut self) {
        self.state.mark_processed(self.id, true);
        self.settled = true;
    }

    fn compensate(&mut self) {
        if self.counted {
            let value = self.counter.decrement();
            self.counted = false;
            tracing::debug!("Item {}: counter compensated to {}", self.id, value);
        }
    }
}

impl Drop for ReservationGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::error!("Item {}: processing ended abnormally", self.id);
        self.compensate();
        self.state.mark_processed(self.id, false);
    }
}

/// Sets the goal-reached flag, logging only for the call that set it
pub fn announce_goal(control: &RunControl, counter: &GoalCounter) {
    if control.signal_goal_reached() {
        tracing::info!("Goal of {} items reached", counter.max());
    }
}

/// Runs the full pipeline for one work item
///
/// Every path out of this function leaves the id processed, failed, or
/// released; it is never left reserved.
pub async fn process_item<A: CatalogApi>(ctx: &HarvestContext<A>, item: &WorkItem) -> ItemOutcome {
    let id = item.id;
    if ctx.control.should_stop() {
        return ItemOutcome::Skipped;
    }

    let Some(mut guard) = ReservationGuard::acquire(&ctx.state, &ctx.counter, id) else {
        tracing::debug!("Item {} already claimed, skipping", id);
        return ItemOutcome::Skipped;
    };

    if ctx.counter.reached_limit() {
        guard.release();
        announce_goal(&ctx.control, &ctx.counter);
        return ItemOutcome::GoalReached;
    }

    let Some(detail) = ctx.api.fetch_detail(id).await else {
        tracing::debug!("Item {}: detail unavailable", id);
        guard.fail();
        return ItemOutcome::Unavailable;
    };

    if let Err(rejection) = ctx.settings.filter.validate(&detail) {
        tracing::debug!("Item {} rejected: {}", id, rejection);
        guard.fail();
        return ItemOutcome::Rejected(rejection);
    }

    let (admitted, count) = ctx.counter.increment();
    if !admitted {
        guard.fail();
        announce_goal(&ctx.control, &ctx.counter);
        return ItemOutcome::AdmissionRefused;
    }
    guard.mark_counted();

    let name = display_name(&detail).unwrap_or(item.name.as_str()).to_string();
    tracing::info!(
        "Accepted item [{}/{}]: {} - {}",
        count,
        ctx.counter.max(),
        id,
        name
    );

    let record = decorate_with_id(detail, &ctx.settings.id_field, id);
    if let Err(e) = ctx.details.append(&record) {
        tracing::error!(
            "Item {}: failed to write detail to {}: {}",
            id,
            ctx.details.describe(),
            e
        );
        guard.fail();
        return ItemOutcome::PersistFailed;
    }

    let mut saved_reviews = 0;
    if ctx.settings.max_reviews > 0 {
        let reviews = collect_reviews(
            &ctx.api,
            id,
            ctx.settings.max_reviews,
            &ctx.control,
            ctx.settings.review_page_pause,
        )
        .await;

        for review in reviews {
            let record = decorate_review(review, &ctx.settings.id_field, id);
            match ctx.reviews.append(&record) {
                Ok(()) => saved_reviews += 1,
                Err(e) => tracing::warn!("Item {}: failed to write review: {}", id, e),
            }
        }
        tracing::info!("{} reviews saved for item {}", saved_reviews, id);
    }

    guard.succeed();
    if ctx.counter.reached_limit() {
        announce_goal(&ctx.control, &ctx.counter);
    }

    ItemOutcome::Accepted {
        count,
        reviews: saved_reviews,
    }
}
