//! Harvest coordinator - main run orchestration logic
//!
//! This module contains the run loop that coordinates all aspects of a
//! harvest, including:
//! - Loading or resetting the checkpoint and reconciling earlier output
//! - Shuffling the remaining work and driving it sequentially or through a
//!   bounded worker pool in batches
//! - Cancelling the rest of a batch once the goal is met
//! - Periodic and final checkpoints

use crate::config::{Config, HarvestConfig};
use crate::control::{GoalCounter, RunControl};
use crate::crawler::catalog::{CatalogApi, SteamCatalog};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::worker::{announce_goal, process_item, HarvestContext, ItemOutcome, WorkerSettings};
use crate::output::{scan_existing_ids, JsonlSink, ProgressReporter, RecordSink, RunSummary};
use crate::proxy::{load_proxy_file, ProxyPool};
use crate::state::{CrawlState, WorkItem};
use crate::{HarvestError, Result};
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Scheduling knobs for one run
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub parallel: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub checkpoint_interval: usize,
    pub batch_pause: Duration,
}

impl From<&HarvestConfig> for HarvestSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            parallel: config.parallel,
            workers: config.workers,
            batch_size: config.batch_size,
            checkpoint_interval: config.checkpoint_interval,
            batch_pause: config.batch_pause(),
        }
    }
}

/// Drives work items through the per-item pipeline
pub struct Harvester<A> {
    ctx: Arc<HarvestContext<A>>,
    settings: HarvestSettings,
    progress: ProgressReporter,
}

impl<A: CatalogApi> Harvester<A> {
    pub fn new(ctx: HarvestContext<A>, settings: HarvestSettings) -> Self {
        let progress = ProgressReporter::new(ctx.counter.max());
        Self {
            ctx: Arc::new(ctx),
            settings,
            progress,
        }
    }

    pub fn context(&self) -> &HarvestContext<A> {
        &self.ctx
    }

    /// Processes the catalog until it is exhausted, the goal is met, or the
    /// run is stopped
    ///
    /// Always ends with a forced checkpoint.
    pub async fn run(&self, catalog: &[WorkItem]) -> RunSummary {
        let mut remaining = self.ctx.state.remaining_work(catalog);
        remaining.shuffle(&mut rand::thread_rng());

        if self.settings.parallel {
            tracing::info!(
                "Parallel mode: {} workers, batches of {}",
                self.settings.workers,
                self.settings.batch_size
            );
            self.run_parallel(remaining).await;
        } else {
            tracing::info!("Sequential mode");
            self.run_sequential(remaining).await;
        }

        if self.ctx.control.is_stop_requested() {
            tracing::warn!("Run interrupted, saving state");
        } else if self.ctx.counter.reached_limit() {
            announce_goal(&self.ctx.control, &self.ctx.counter);
        }

        self.checkpoint(true);
        self.summary()
    }

    /// Tallies of the run so far
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            self.ctx.counter.value(),
            self.ctx.counter.max(),
            self.ctx.state.counts(),
        )
    }

    /// Writes the checkpoint, logging (not propagating) failures
    pub fn checkpoint(&self, force: bool) {
        self.ctx.state.set_total_accepted(self.ctx.counter.value());
        // Failures are logged by `save`; the run continues without durability
        let _ = self.ctx.state.save(force);
    }

    fn should_wind_down(&self) -> bool {
        self.ctx.control.should_stop() || self.ctx.counter.reached_limit()
    }

    fn settle(&self, joined: std::result::Result<ItemOutcome, JoinError>) -> ItemOutcome {
        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Worker task failed: {}", e);
                ItemOutcome::Crashed
            }
        }
    }

    fn after_item(&self, outcome: &ItemOutcome, completed: &mut usize) {
        if *outcome == ItemOutcome::Skipped {
            return;
        }
        *completed += 1;
        if *completed % self.settings.checkpoint_interval.max(1) == 0 {
            self.checkpoint(false);
        }
        self.progress.update(self.ctx.counter.value());
    }

    async fn run_sequential(&self, remaining: Vec<WorkItem>) {
        let mut completed = 0;

        for item in remaining {
            if self.should_wind_down() {
                break;
            }

            let ctx = Arc::clone(&self.ctx);
            let joined = tokio::spawn(async move { process_item(&ctx, &item).await }).await;
            let outcome = self.settle(joined);
            self.after_item(&outcome, &mut completed);
        }
    }

    async fn run_parallel(&self, remaining: Vec<WorkItem>) {
        let semaphore = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let batch_size = self.settings.batch_size.max(1);
        let total_batches = remaining.len().div_ceil(batch_size);
        let mut completed = 0;

        for (index, batch) in remaining.chunks(batch_size).enumerate() {
            if self.should_wind_down() {
                break;
            }

            self.ctx.state.set_last_batch_index(index as u64);
            tracing::debug!(
                "Batch {}/{}: {} items",
                index + 1,
                total_batches,
                batch.len()
            );

            let batch_token = self.ctx.control.child_token();
            let mut tasks = JoinSet::new();

            for item in batch.iter().cloned() {
                let ctx = Arc::clone(&self.ctx);
                let semaphore = Arc::clone(&semaphore);
                let token = batch_token.clone();

                tasks.spawn(async move {
                    let permit = tokio::select! {
                        permit = semaphore.acquire_owned() => permit,
                        _ = token.cancelled() => return ItemOutcome::Skipped,
                    };
                    let Ok(_permit) = permit else {
                        return ItemOutcome::Skipped;
                    };
                    if token.is_cancelled() {
                        return ItemOutcome::Skipped;
                    }
                    process_item(&ctx, &item).await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let outcome = self.settle(joined);
                self.after_item(&outcome, &mut completed);

                if self.should_wind_down() && !batch_token.is_cancelled() {
                    tracing::debug!("Cancelling the rest of batch {}", index + 1);
                    batch_token.cancel();
                }
            }

            if self.should_wind_down() {
                break;
            }

            let more = index + 1 < total_batches;
            if more && !self.ctx.control.sleep(self.settings.batch_pause).await {
                break;
            }
        }
    }
}

/// Runs a harvest against any catalog
///
/// Reconciles ids found in the detail output, then hands the remaining
/// catalog to a [`Harvester`]. A forced checkpoint is attempted on every
/// exit path, including errors.
pub async fn harvest_catalog<A: CatalogApi>(
    config: &Config,
    api: A,
    state: Arc<CrawlState>,
    control: Arc<RunControl>,
) -> Result<RunSummary> {
    let result = harvest_inner(config, api, Arc::clone(&state), control).await;
    if let Err(e) = &result {
        tracing::error!("Harvest aborted: {}", e);
        let _ = state.save(true);
    }
    result
}

async fn harvest_inner<A: CatalogApi>(
    config: &Config,
    api: A,
    state: Arc<CrawlState>,
    control: Arc<RunControl>,
) -> Result<RunSummary> {
    let target = config.harvest.max_items;

    let catalog = api.list_catalog().await;
    if catalog.is_empty() {
        if control.is_stop_requested() {
            state.save(true)?;
            return Ok(RunSummary::new(0, target, state.counts()));
        }
        return Err(HarvestError::EmptyCatalog);
    }

    let details_path = Path::new(&config.output.details_path);
    let existing = scan_existing_ids(details_path, &config.output.id_field)?;
    state.absorb_processed(existing.iter().copied());

    let counter = Arc::new(GoalCounter::new(existing.len() as u64, target));
    state.set_total_accepted(counter.value());
    tracing::info!("Progress toward goal: {}/{}", counter.value(), target);

    if counter.reached_limit() {
        tracing::info!(
            "Goal already met: {} items in {}",
            counter.value(),
            details_path.display()
        );
        state.save(true)?;
        return Ok(RunSummary::new(counter.value(), target, state.counts()));
    }

    let details: Arc<dyn RecordSink> = Arc::new(JsonlSink::open(&config.output.details_path)?);
    let reviews: Arc<dyn RecordSink> = Arc::new(JsonlSink::open(&config.output.reviews_path)?);

    let ctx = HarvestContext {
        api,
        state,
        counter,
        control,
        details,
        reviews,
        settings: WorkerSettings::from(config),
    };
    let harvester = Harvester::new(ctx, HarvestSettings::from(&config.harvest));
    Ok(harvester.run(&catalog).await)
}

/// Runs a complete harvest against the configured store API
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `control` - Run-wide stop flags, shared with the signal handler
/// * `reset` - Delete every checkpoint file before loading state
pub async fn run_harvest(
    config: &Config,
    control: Arc<RunControl>,
    reset: bool,
) -> Result<RunSummary> {
    let state = Arc::new(CrawlState::new(&config.output.checkpoint_path));
    if reset {
        tracing::info!("Resetting checkpoint state");
        state.checkpoint_file().remove_all()?;
    }
    state.load();

    let proxy_list = config
        .proxy
        .list_path
        .as_deref()
        .map(|path| load_proxy_file(Path::new(path)))
        .unwrap_or_default();
    tracing::info!("{} proxies loaded", proxy_list.len());
    let proxies = Arc::new(ProxyPool::new(proxy_list));

    let fetcher = Fetcher::new(Arc::clone(&control))?;
    let api = SteamCatalog::new(config.api.clone(), fetcher, proxies);

    harvest_catalog(config, api, state, control).await
}
