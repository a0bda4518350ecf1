//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients, optionally routed through a forward proxy
//! - Bounded retries with backoff for rate limiting and transport errors
//! - Observing the run's stop flags before every attempt
//!
//! Decoding is left to the callers, since each endpoint treats malformed
//! bodies differently.

use crate::control::RunControl;
use crate::proxy::ProxySettings;
use rand::Rng;
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Ceiling for rate-limit backoff
const MAX_RATE_LIMIT_DELAY: f64 = 10.0;

/// Ceiling for transport-error backoff
const MAX_RETRY_DELAY: f64 = 3.0;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `proxy` - Forward proxy to route every request through, if any
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. malformed proxy URL)
pub fn build_http_client(proxy: Option<&ProxySettings>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(settings) = proxy {
        builder = builder.proxy(Proxy::all(settings.url.as_str())?);
    }

    builder.build()
}

/// Delay before retrying after an HTTP 429
///
/// `min(2^attempt + jitter, 10s)` with jitter drawn from `[0, 1)` seconds.
pub fn rate_limit_delay(attempt: u32) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    let exponential = 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64((exponential + jitter).min(MAX_RATE_LIMIT_DELAY))
}

/// Delay before retrying after a transport or status error
///
/// `min(0.5 * (attempt + 1), 3s)`
pub fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs_f64((0.5 * f64::from(attempt + 1)).min(MAX_RETRY_DELAY))
}

/// A single logical GET request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub timeout: Duration,
    pub proxy: Option<ProxySettings>,
    pub max_attempts: u32,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
            timeout: Duration::from_secs(15),
            proxy: None,
            max_attempts: 3,
        }
    }

    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy(mut self, proxy: Option<ProxySettings>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Rate-limit aware GET client shared by every worker
///
/// One client is kept per proxy URL so connection pools are reused across
/// requests routed the same way.
#[derive(Debug)]
pub struct Fetcher {
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
    control: Arc<RunControl>,
}

impl Fetcher {
    pub fn new(control: Arc<RunControl>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            direct: build_http_client(None)?,
            proxied: Mutex::new(HashMap::new()),
            control,
        })
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    fn client_for(&self, proxy: Option<&ProxySettings>) -> Option<Client> {
        let Some(settings) = proxy else {
            return Some(self.direct.clone());
        };

        let mut clients = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&settings.url) {
            return Some(client.clone());
        }

        match build_http_client(Some(settings)) {
            Ok(client) => {
                clients.insert(settings.url.clone(), client.clone());
                Some(client)
            }
            Err(e) => {
                tracing::warn!("Cannot build client for proxy {}: {}", settings.url, e);
                None
            }
        }
    }

    /// Fetches a URL with retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Stop or goal flag set | Give up before the attempt |
    /// | HTTP 429 | Sleep `min(2^attempt + jitter, 10s)`, next attempt |
    /// | Other non-2xx, transport error | Sleep `min(0.5 * (attempt + 1), 3s)`, next attempt |
    ///
    /// Sleeps wake early when the run is cancelled. No sleep follows the
    /// final attempt.
    ///
    /// # Returns
    ///
    /// The response body, or `None` once attempts are exhausted or the run
    /// is stopping.
    pub async fn fetch(&self, request: FetchRequest) -> Option<String> {
        let client = self.client_for(request.proxy.as_ref())?;

        for attempt in 0..request.max_attempts {
            if self.control.should_stop() {
                return None;
            }
            let is_last = attempt + 1 >= request.max_attempts;

            let result = client
                .get(&request.url)
                .query(&request.params)
                .timeout(request.timeout)
                .send()
                .await;

            let delay = match result {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let delay = rate_limit_delay(attempt);
                    tracing::warn!(
                        "Rate limited on {}, waiting {:.2}s",
                        request.url,
                        delay.as_secs_f64()
                    );
                    delay
                }
                Ok(response) if response.status().is_success() => match response.text().await {
                    Ok(body) => return Some(body),
                    Err(e) => {
                        tracing::debug!("Failed to read body from {}: {}", request.url, e);
                        retry_delay(attempt)
                    }
                },
                Ok(response) => {
                    tracing::debug!("HTTP {} from {}", response.status(), request.url);
                    retry_delay(attempt)
                }
                Err(e) => {
                    tracing::debug!("Request to {} failed: {}", request.url, e);
                    retry_delay(attempt)
                }
            };

            if is_last {
                tracing::debug!(
                    "Giving up on {} after {} attempts",
                    request.url,
                    request.max_attempts
                );
                break;
            }
            if !self.control.sleep(delay).await {
                return None;
            }
        }

        None
    }
}
