//! Request dispatch module
//!
//! Extracts the headers the cache engine consumes, builds the per-request
//! responder, dispatches to static serving, and emits the access log entry.
//! The request method is deliberately not branched on: all requests are
//! treated uniformly.

use crate::config::AppState;
use crate::http::cache::PolicySource;
use crate::http::ResponseBody;
use crate::logger::{self, AccessLogEntry};
use crate::responder::{Responder, RequestInfo};
use hyper::body::Body as _;
use hyper::{Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let started = Instant::now();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(ToString::to_string);
    let http_version = version_str(req.version());

    let header = |name: &str| -> Option<String> {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let referer = header("referer");
    let user_agent = header("user-agent");
    let proxied = is_proxied(&req);

    let request = RequestInfo {
        cache_control: header("cache-control"),
        if_modified_since: header("if-modified-since"),
        proxied,
    };

    let mut responder = Responder::new(Arc::clone(&state), request);
    if state.config.http.enable_cors {
        responder.allow_origin("*");
    }

    let root = PathBuf::from(&state.config.serve.root);
    let requested = path.trim_start_matches('/');
    let response = responder.serve_dir(&root, requested).await;

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(peer_addr.ip().to_string(), method, path);
        entry.query = query;
        entry.http_version = http_version.to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.referer = referer;
        entry.user_agent = user_agent;
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry.proxied = proxied;
        entry.cache_source = response
            .extensions()
            .get::<PolicySource>()
            .map(|source| source.as_str());
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

const fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        _ => "1.1",
    }
}

/// Informational proxy flag: set when any forwarding header is present.
/// Consulted only for logging; never changes serving behavior.
fn is_proxied(req: &Request<hyper::body::Incoming>) -> bool {
    if req.headers().contains_key("x-forwarded-for") || req.headers().contains_key("x-real-ip") {
        return true;
    }
    req.headers()
        .get("x-proxy-server")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "nginx")
}
