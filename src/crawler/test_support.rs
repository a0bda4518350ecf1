//! In-memory stand-ins for the remote catalog and the output files

use crate::control::{GoalCounter, RunControl};
use crate::crawler::catalog::{CatalogApi, ReviewPage};
use crate::crawler::worker::{HarvestContext, WorkerSettings};
use crate::output::{OutputError, OutputResult, RecordSink};
use crate::records::DetailFilter;
use crate::state::{CrawlState, WorkItem};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

type DetailHook = Box<dyn Fn(u64) + Send + Sync>;

/// A detail payload that passes the default filter
pub fn game_detail(name: &str) -> Value {
    json!({
        "type": "game",
        "name": name,
        "categories": [{"id": 2, "description": "Single-player"}],
        "is_free": false
    })
}

/// Scripted catalog that counts every call
#[derive(Default)]
pub struct MockCatalog {
    items: Vec<WorkItem>,
    details: HashMap<u64, Value>,
    pages: HashMap<(u64, String), ReviewPage>,
    detail_delay: Duration,
    detail_hook: Option<DetailHook>,
    detail_calls: AtomicUsize,
    detail_in_flight: AtomicUsize,
    detail_peak: AtomicUsize,
    review_calls: AtomicUsize,
    requested_counts: Mutex<Vec<u32>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists `id` with a valid game detail
    pub fn with_game(self, id: u64, name: &str) -> Self {
        self.with_detail(id, game_detail(name))
    }

    /// Lists `id` with an arbitrary detail payload
    pub fn with_detail(mut self, id: u64, detail: Value) -> Self {
        let name = detail["name"].as_str().unwrap_or_default().to_string();
        self.items.push(WorkItem::new(id, name));
        self.details.insert(id, detail);
        self
    }

    /// Lists `id` without any detail payload
    pub fn with_unavailable(mut self, id: u64) -> Self {
        self.items.push(WorkItem::new(id, ""));
        self
    }

    pub fn with_review_page(mut self, id: u64, cursor: &str, page: ReviewPage) -> Self {
        self.pages.insert((id, cursor.to_string()), page);
        self
    }

    pub fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    /// Runs `hook` inside every detail fetch, before the payload is returned
    pub fn on_detail_fetch(mut self, hook: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.detail_hook = Some(Box::new(hook));
        self
    }

    pub fn items(&self) -> Vec<WorkItem> {
        self.items.clone()
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// Highest number of detail fetches observed in flight at once
    pub fn detail_peak(&self) -> usize {
        self.detail_peak.load(Ordering::SeqCst)
    }

    pub fn review_calls(&self) -> usize {
        self.review_calls.load(Ordering::SeqCst)
    }

    pub fn requested_counts(&self) -> Vec<u32> {
        self.requested_counts.lock().unwrap().clone()
    }
}

impl CatalogApi for MockCatalog {
    async fn list_catalog(&self) -> Vec<WorkItem> {
        self.items.clone()
    }

    async fn fetch_detail(&self, id: u64) -> Option<Value> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.detail_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.detail_peak.fetch_max(now, Ordering::SeqCst);
        if !self.detail_delay.is_zero() {
            tokio::time::sleep(self.detail_delay).await;
        }
        self.detail_in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(hook) = &self.detail_hook {
            hook(id);
        }
        self.details.get(&id).cloned()
    }

    async fn fetch_review_page(&self, id: u64, cursor: &str, count: u32) -> Option<ReviewPage> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_counts.lock().unwrap().push(count);
        self.pages.get(&(id, cursor.to_string())).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkMode {
    Normal,
    Failing,
    Panicking,
}

/// Record sink kept in memory
#[derive(Debug)]
pub struct MemorySink {
    mode: SinkMode,
    records: Mutex<Vec<Value>>,
}

impl MemorySink {
    fn with_mode(mode: SinkMode) -> Self {
        Self {
            mode,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_mode(SinkMode::Normal)
    }

    /// A sink whose every append returns an error
    pub fn failing() -> Self {
        Self::with_mode(SinkMode::Failing)
    }

    /// A sink whose every append panics
    pub fn panicking() -> Self {
        Self::with_mode(SinkMode::Panicking)
    }

    pub fn records(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &Value) -> OutputResult<()> {
        match self.mode {
            SinkMode::Normal => {
                self.records.lock().unwrap().push(record.clone());
                Ok(())
            }
            SinkMode::Failing => Err(OutputError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            ))),
            SinkMode::Panicking => panic!("sink exploded"),
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Shared run objects backed by a temporary checkpoint directory
pub struct Fixture {
    pub state: Arc<CrawlState>,
    pub counter: Arc<GoalCounter>,
    pub control: Arc<RunControl>,
    pub details: Arc<MemorySink>,
    pub reviews: Arc<MemorySink>,
    pub dir: TempDir,
}

impl Fixture {
    pub fn new(initial: u64, target: u64) -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            state: Arc::new(CrawlState::new(dir.path().join("state.progress"))),
            counter: Arc::new(GoalCounter::new(initial, target)),
            control: Arc::new(RunControl::new()),
            details: Arc::new(MemorySink::new()),
            reviews: Arc::new(MemorySink::new()),
            dir,
        }
    }

    pub fn with_details(mut self, sink: MemorySink) -> Self {
        self.details = Arc::new(sink);
        self
    }

    pub fn with_reviews(mut self, sink: MemorySink) -> Self {
        self.reviews = Arc::new(sink);
        self
    }

    pub fn context<A: CatalogApi>(&self, api: A, max_reviews: u32) -> HarvestContext<A> {
        let details: Arc<dyn RecordSink> = self.details.clone();
        let reviews: Arc<dyn RecordSink> = self.reviews.clone();
        HarvestContext {
            api,
            state: Arc::clone(&self.state),
            counter: Arc::clone(&self.counter),
            control: Arc::clone(&self.control),
            details,
            reviews,
            settings: WorkerSettings {
                max_reviews,
                id_field: "appid".to_string(),
                filter: DetailFilter::default(),
                review_page_pause: Duration::ZERO,
            },
        }
    }
}
