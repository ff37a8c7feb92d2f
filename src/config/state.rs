// Application state module
// Holds the parsed configuration and the shared cache policy store

use super::types::Config;
use crate::http::cache::CachePolicyStore;

/// Shared application state, constructed once at startup
pub struct AppState {
    pub config: Config,
    /// Default document names, parsed from the comma-separated config string
    pub default_files: Vec<String>,
    /// Discovered cache policies, keyed by resolved file path.
    /// Explicitly constructed here and injected everywhere so tests can
    /// supply an isolated instance.
    pub policy_store: CachePolicyStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let default_files = parse_filenames(&config.serve.default_files);
        Self {
            config,
            default_files,
            policy_store: CachePolicyStore::new(),
        }
    }
}

/// Split a comma-separated filename list, trimming whitespace and dropping
/// empty items
fn parse_filenames(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
