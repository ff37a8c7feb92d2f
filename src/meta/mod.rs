//! Streaming meta-tag scanner module
//!
//! Inspects HTML byte streams for an embedded
//! `<meta http-equiv="Cache-Control" content="...">` tag without buffering
//! the whole document. The scanner is a pure observer: callers feed it every
//! chunk they forward downstream, and it reports the tag's `content` value at
//! most once per instance.

use regex::bytes::Regex;
use std::sync::OnceLock;

static META_TAG: OnceLock<Regex> = OnceLock::new();
static CONTENT_ATTR: OnceLock<Regex> = OnceLock::new();

/// Locate a cache-control meta tag, tolerating any attribute order and
/// single, double, or no quotes around the http-equiv value
fn meta_tag_regex() -> &'static Regex {
    META_TAG.get_or_init(|| {
        Regex::new(r#"(?i)<meta\s[^>]*http-equiv\s*=\s*['"]?cache-control['"]?[^>]*>"#)
            .expect("meta tag pattern is valid")
    })
}

/// Extract the content attribute from a matched tag: quoted values may
/// contain spaces and commas, bare values run to the next whitespace
fn content_attr_regex() -> &'static Regex {
    CONTENT_ATTR.get_or_init(|| {
        Regex::new(r#"(?i)content\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>'"]+))"#)
            .expect("content attribute pattern is valid")
    })
}

/// Stateful scanner for one HTML stream.
///
/// Accumulates bytes up to `limit`; a valid cache directive appears in the
/// document head, so once the cap passes without a match the scanner disarms
/// and frees its buffer. After a match or give-up every further `scan` call
/// is a no-op.
#[derive(Debug)]
pub struct MetaScanner {
    buffer: Vec<u8>,
    limit: usize,
    done: bool,
}

impl MetaScanner {
    pub const fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
            done: false,
        }
    }

    /// Feed one chunk of the stream.
    ///
    /// Returns the tag's `content` value on the call that first completes a
    /// match, and `None` on every other call. The chunk itself is untouched;
    /// forwarding it downstream is the caller's job.
    pub fn scan(&mut self, chunk: &[u8]) -> Option<String> {
        if self.done {
            return None;
        }
        self.buffer.extend_from_slice(chunk);

        if let Some(tag) = meta_tag_regex().find(&self.buffer) {
            if let Some(captures) = content_attr_regex().captures(tag.as_bytes()) {
                let value = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .or_else(|| captures.get(3))
                    .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());
                if value.is_some() {
                    self.disarm();
                    return value;
                }
            }
        }

        if self.buffer.len() > self.limit {
            self.disarm();
        }
        None
    }

    pub const fn is_done(&self) -> bool {
        self.done
    }

    fn disarm(&mut self) {
        self.done = true;
        self.buffer = Vec::new();
    }
}
