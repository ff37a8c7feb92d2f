//! Responder facade module
//!
//! One `Responder` is constructed per request/response exchange and discarded
//! at the end of it. It is the only component that constructs `hyper`
//! responses: generic sends, JSON, redirects, errors, forced downloads, and
//! the static-serving entry point in [`serve`].

pub mod listing;
mod serve;

use crate::config::AppState;
use crate::http::{self, ResponseBody};
use crate::logger;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

/// Request-scoped inputs the facade consults
#[derive(Debug, Default, Clone)]
pub struct RequestInfo {
    /// Raw request `Cache-Control` header
    pub cache_control: Option<String>,
    /// Raw request `If-Modified-Since` header
    pub if_modified_since: Option<String>,
    /// Whether a proxy header was seen (informational; never changes serving)
    pub proxied: bool,
}

/// Options for [`Responder::send`]
pub struct SendOptions {
    pub status: StatusCode,
    /// `None` falls back to the configured default content type
    pub content_type: Option<String>,
    /// Extra headers; a later entry with the same name overwrites an earlier
    /// one
    pub headers: Vec<(String, String)>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            headers: Vec::new(),
        }
    }
}

impl SendOptions {
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_type(status: StatusCode, content_type: &str) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            headers: Vec::new(),
        }
    }
}

/// Per-request responder facade
pub struct Responder {
    state: Arc<AppState>,
    request: RequestInfo,
    /// Explicit per-response max-age override; starts at the server-wide
    /// default from config
    max_age: u64,
    /// CORS origin to emit on every response from this facade, when armed
    cors_origin: Option<String>,
    /// Headers staged by callers (e.g. `download`) for the next response
    pending_headers: Vec<(String, String)>,
}

impl Responder {
    pub fn new(state: Arc<AppState>, request: RequestInfo) -> Self {
        let max_age = state.config.serve.max_age;
        Self {
            state,
            request,
            max_age,
            cors_origin: None,
            pending_headers: Vec::new(),
        }
    }

    /// Override the explicit max-age for this response (highest precedence
    /// when non-zero)
    pub fn set_max_age(&mut self, seconds: u64) {
        self.max_age = seconds;
    }

    /// Arm CORS response headers for every response this facade constructs
    pub fn allow_origin(&mut self, domain: &str) {
        self.cors_origin = Some(domain.to_string());
    }

    /// Stage a header for the next response; a later call with the same name
    /// overwrites the earlier value
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.pending_headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.pending_headers
            .push((name.to_string(), value.to_string()));
    }

    /// Generic response constructor: status, content type, extra headers,
    /// body. An empty body closes the response with headers only.
    pub fn send(&self, body: Bytes, options: SendOptions) -> Response<ResponseBody> {
        let content_type = options
            .content_type
            .unwrap_or_else(|| self.state.config.http.default_content_type.clone());

        let mut builder = Response::builder()
            .status(options.status)
            .header("Content-Type", content_type)
            .header("Server", self.state.config.http.server_name.as_str());
        builder = self.apply_cors(builder);
        for (name, value) in merge_headers(&self.pending_headers, &options.headers) {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let payload = if body.is_empty() {
            http::empty()
        } else {
            builder = builder.header("Content-Length", body.len());
            http::full(body)
        };

        builder.body(payload).unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build response: {e}"));
            Response::new(http::empty())
        })
    }

    /// Serialize `data` as JSON.
    ///
    /// Serialization errors are a local, recoverable condition: the caller
    /// gets a 500 plain-text response with a fixed message, never an `Err`.
    pub fn send_json<T: Serialize>(&self, data: &T, status: StatusCode) -> Response<ResponseBody> {
        match serde_json::to_string(data) {
            Ok(json) => self.send(
                Bytes::from(json),
                SendOptions::with_type(status, "application/json; charset=utf-8"),
            ),
            Err(e) => {
                logger::log_error(&format!("Failed to serialize JSON response: {e}"));
                self.send_error(StatusCode::INTERNAL_SERVER_ERROR, "json error")
            }
        }
    }

    /// Redirect with a `Location` header and an empty body
    pub fn redirect(&self, location: &str, status: StatusCode) -> Response<ResponseBody> {
        let mut builder = Response::builder()
            .status(status)
            .header("Location", location)
            .header("Server", self.state.config.http.server_name.as_str());
        builder = self.apply_cors(builder);
        builder.body(http::empty()).unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build redirect response: {e}"));
            Response::new(http::empty())
        })
    }

    /// Plain-text error response with a fixed message
    pub fn send_error(&self, status: StatusCode, message: &str) -> Response<ResponseBody> {
        self.send(
            Bytes::from(message.to_string()),
            SendOptions::with_type(status, "text/plain; charset=utf-8"),
        )
    }

    /// Force a download: `Content-Disposition: attachment`, then the normal
    /// file-streaming path
    pub async fn download(
        &mut self,
        path: std::path::PathBuf,
        filename: &str,
    ) -> Response<ResponseBody> {
        self.set_header(
            "Content-Disposition",
            &format!("attachment; filename=\"{filename}\""),
        );
        self.stream_file(path).await
    }

    /// Fixed minimal HTML error response; no internal detail ever leaks
    pub(crate) fn send_error_page(&self, status: StatusCode, message: &str) -> Response<ResponseBody> {
        let title = format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        );
        let body = format!(
            "<html><head><title>{title}</title></head>\
             <body><center><h1>{message}</h1></center></body></html>"
        );
        self.send(
            Bytes::from(body),
            SendOptions::with_type(status, "text/html; charset=utf-8"),
        )
    }

    fn apply_cors(&self, mut builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
        if let Some(origin) = &self.cors_origin {
            builder = builder
                .header("Access-Control-Allow-Origin", origin.as_str())
                .header(
                    "Access-Control-Allow-Headers",
                    "Content-Type,Content-Length,Authorization,Accept,X-Requested-With",
                )
                .header("Access-Control-Allow-Methods", "PUT,POST,GET,DELETE,OPTIONS");
        }
        builder
    }

    pub(crate) fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub(crate) fn request(&self) -> &RequestInfo {
        &self.request
    }

    pub(crate) const fn explicit_max_age(&self) -> u64 {
        self.max_age
    }
}

/// Merge staged and per-call headers, keeping the last value per name
fn merge_headers(
    staged: &[(String, String)],
    per_call: &[(String, String)],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::new();
    for (name, value) in staged.iter().chain(per_call) {
        merged.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        merged.push((name.clone(), value.clone()));
    }
    merged
}
