//! Proxy list parsing

use std::path::Path;

/// Scheme prefixed to entries given as bare `host:port`
const DEFAULT_SCHEME: &str = "https://";

/// Parses a comma and/or newline separated proxy list
///
/// Entries are trimmed, empty entries dropped, and entries without a scheme
/// get [`DEFAULT_SCHEME`] prefixed.
///
/// # Example
///
/// ```
/// use catalog_harvester::proxy::parse_proxy_list;
///
/// let proxies = parse_proxy_list("10.0.0.1:8080,\nhttp://10.0.0.2:3128\n");
/// assert_eq!(proxies, vec!["https://10.0.0.1:8080", "http://10.0.0.2:3128"]);
/// ```
pub fn parse_proxy_list(content: &str) -> Vec<String> {
    content
        .split(|c: char| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry.contains("://") {
                entry.to_string()
            } else {
                format!("{}{}", DEFAULT_SCHEME, entry)
            }
        })
        .collect()
}

/// Loads a proxy list file
///
/// A missing or unreadable file yields an empty list, which leaves only the
/// local network path in rotation.
pub fn load_proxy_file(path: &Path) -> Vec<String> {
    if !path.exists() {
        tracing::info!("Proxy list {} not found, using local network only", path.display());
        return Vec::new();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let proxies = parse_proxy_list(&content);
            tracing::info!("Loaded {} proxies from {}", proxies.len(), path.display());
            proxies
        }
        Err(e) => {
            tracing::error!("Failed to read proxy list {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
