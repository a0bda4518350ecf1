//! Round-robin proxy rotation

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A route for outgoing requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProxyEndpoint {
    /// Direct connection over the local network
    Local,

    /// Forward proxy URL
    Remote(String),
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

/// Forward-proxy settings handed to the fetch layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxySettings {
    pub url: String,
}

/// Rotates through the local route and every configured proxy
///
/// Failed proxies stay in rotation; failure is consulted when a draw is
/// turned into settings, so a drawn failed proxy falls back to the local
/// route.
#[derive(Debug)]
pub struct ProxyPool {
    seed: Vec<ProxyEndpoint>,
    rotation: Mutex<VecDeque<ProxyEndpoint>>,
    failed: Mutex<HashSet<String>>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<String>) -> Self {
        let seed: Vec<ProxyEndpoint> = std::iter::once(ProxyEndpoint::Local)
            .chain(proxies.into_iter().map(ProxyEndpoint::Remote))
            .collect();
        Self {
            rotation: Mutex::new(seed.iter().cloned().collect()),
            seed,
            failed: Mutex::new(HashSet::new()),
        }
    }

    /// A pool that only ever routes locally
    pub fn local_only() -> Self {
        Self::new(Vec::new())
    }

    /// Number of endpoints in rotation, including the local route
    pub fn len(&self) -> usize {
        self.seed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seed.is_empty()
    }

    /// Draws the next endpoint and puts it back at the tail
    pub fn next(&self) -> ProxyEndpoint {
        let mut rotation = self.rotation.lock().unwrap_or_else(PoisonError::into_inner);
        if rotation.is_empty() {
            rotation.extend(self.seed.iter().cloned());
        }
        match rotation.pop_front() {
            Some(endpoint) => {
                rotation.push_back(endpoint.clone());
                endpoint
            }
            None => ProxyEndpoint::Local,
        }
    }

    /// Marks a proxy as failed; the local route is never marked
    pub fn mark_failed(&self, endpoint: &ProxyEndpoint) {
        if let ProxyEndpoint::Remote(url) = endpoint {
            let newly_failed = self
                .failed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(url.clone());
            if newly_failed {
                tracing::warn!("Proxy marked as failed: {}", url);
            }
        }
    }

    pub fn is_failed(&self, endpoint: &ProxyEndpoint) -> bool {
        match endpoint {
            ProxyEndpoint::Local => false,
            ProxyEndpoint::Remote(url) => self
                .failed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(url),
        }
    }

    /// Returns proxy settings for an endpoint
    ///
    /// `None` means "connect directly": the endpoint is the local route or
    /// is currently marked failed.
    pub fn settings_for(&self, endpoint: &ProxyEndpoint) -> Option<ProxySettings> {
        match endpoint {
            ProxyEndpoint::Local => None,
            ProxyEndpoint::Remote(_) if self.is_failed(endpoint) => None,
            ProxyEndpoint::Remote(url) => Some(ProxySettings { url: url.clone() }),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
