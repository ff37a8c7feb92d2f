//! HTTP cache policy module
//!
//! The cache-policy resolution core: the shared store of discovered policies,
//! request `Cache-Control` parsing, effective-policy precedence, and the
//! `If-Modified-Since` conditional check.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Cache policy for a single file
///
/// A `max_age` of zero means "no caching directive". That is distinct from an
/// absent store entry: a discovered `max-age=0` is a final answer and the
/// path is not scanned again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: u64,
}

/// Process-wide map from resolved file path to discovered cache policy.
///
/// Populated lazily by the meta scanner while HTML files stream out, and
/// consulted by every subsequent request for the same path. Entries are never
/// evicted; a file edited on disk keeps serving its stale policy until the
/// process restarts (documented limitation).
#[derive(Debug, Default)]
pub struct CachePolicyStore {
    entries: DashMap<PathBuf, CachePolicy>,
}

impl CachePolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<CachePolicy> {
        self.entries.get(path).map(|entry| *entry.value())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Record a discovered policy for a path.
    ///
    /// First write wins: two requests racing to scan the same never-cached
    /// file both derive the value from the same file content, so dropping the
    /// second insert is harmless and keeps the outcome deterministic.
    pub fn discover(&self, path: PathBuf, policy: CachePolicy) {
        self.entries.entry(path).or_insert(policy);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Parsed value of one request cache directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    /// Directive with a value, surrounding quotes stripped
    Value(String),
    /// Bare directive with no value (e.g. `no-cache`)
    Flag,
}

/// Parsed form of a request's `Cache-Control` header
///
/// Purely request-scoped; discarded after use.
#[derive(Debug, Default)]
pub struct RequestCacheDirectives {
    directives: HashMap<String, DirectiveValue>,
}

impl RequestCacheDirectives {
    pub fn get(&self, name: &str) -> Option<&DirectiveValue> {
        self.directives.get(name)
    }

    /// The request's `max-age` in seconds, with a baseline of 0 when the
    /// directive is absent or not numeric
    pub fn max_age(&self) -> u64 {
        match self.directives.get("max-age") {
            Some(DirectiveValue::Value(v)) => v.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Parse a request `Cache-Control` header into its directives.
///
/// Splits on commas, then each directive on `=`; names are lowercased and
/// surrounding quotes are stripped from values. An absent or empty header
/// yields no directives (`max_age()` then reports the baseline 0).
pub fn parse_cache_control(raw: Option<&str>) -> RequestCacheDirectives {
    let mut directives = HashMap::new();
    if let Some(header) = raw {
        for directive in header.split(',') {
            let directive = directive.trim();
            if directive.is_empty() {
                continue;
            }
            match directive.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim().trim_matches('"');
                    directives.insert(
                        name.trim().to_lowercase(),
                        DirectiveValue::Value(value.to_string()),
                    );
                }
                None => {
                    directives.insert(directive.to_lowercase(), DirectiveValue::Flag);
                }
            }
        }
    }
    RequestCacheDirectives { directives }
}

/// Which precedence level produced the effective policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    /// Per-response override set on the facade (or the server-wide default)
    Explicit,
    /// The request's own `Cache-Control: max-age` header
    Request,
    /// A store entry discovered from the file's embedded meta tag
    Discovered,
    /// No source found; no caching headers are emitted
    Default,
}

impl PolicySource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Request => "request",
            Self::Discovered => "discovered",
            Self::Default => "default",
        }
    }
}

/// The max-age actually applied to a response, plus the source that won
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePolicy {
    pub max_age: u64,
    pub source: PolicySource,
}

/// Resolve the effective cache policy for one response.
///
/// Precedence, highest first, short-circuiting at the first source found
/// (values are never merged or averaged):
/// 1. a non-zero explicit per-response override;
/// 2. a non-zero `max-age` from the request's own `Cache-Control` header;
/// 3. any store entry for the path, including a discovered `max-age=0`;
/// 4. the default of 0 (no caching headers).
pub fn resolve_effective(
    explicit: u64,
    request: &RequestCacheDirectives,
    stored: Option<CachePolicy>,
) -> EffectivePolicy {
    if explicit != 0 {
        return EffectivePolicy {
            max_age: explicit,
            source: PolicySource::Explicit,
        };
    }
    let requested = request.max_age();
    if requested != 0 {
        return EffectivePolicy {
            max_age: requested,
            source: PolicySource::Request,
        };
    }
    if let Some(policy) = stored {
        return EffectivePolicy {
            max_age: policy.max_age,
            source: PolicySource::Discovered,
        };
    }
    EffectivePolicy {
        max_age: 0,
        source: PolicySource::Default,
    }
}

/// Evaluate an `If-Modified-Since` conditional request against the effective
/// max-age.
///
/// Hit (serve 304) iff `now <= client_timestamp + max_age`, in whole seconds.
/// An unparseable header is a miss, so the full response is sent.
pub fn conditional_hit(if_modified_since: &str, effective_max_age: u64, now_unix: i64) -> bool {
    let Ok(client_time) = DateTime::parse_from_rfc2822(if_modified_since) else {
        return false;
    };
    let deadline = client_time
        .timestamp()
        .saturating_add(i64::try_from(effective_max_age).unwrap_or(i64::MAX));
    now_unix <= deadline
}

/// Format a timestamp as an HTTP-date (IMF-fixdate) for `Last-Modified`
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
