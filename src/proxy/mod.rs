//! Proxy rotation for outgoing requests
//!
//! The pool always contains the local network route plus every proxy loaded
//! from the configured list. Proxies that misbehave are marked failed but
//! keep rotating, so a recovered proxy is picked up again without health checks.

mod list;
mod pool;

pub use list::{load_proxy_file, parse_proxy_list};
pub use pool::{ProxyEndpoint, ProxyPool, ProxySettings};
