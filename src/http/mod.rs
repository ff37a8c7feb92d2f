//! HTTP protocol layer module
//!
//! Protocol-level building blocks shared by the responder facade: cache
//! policy resolution, MIME lookup, and the streaming response body type.

pub mod body;
pub mod cache;
pub mod mime;

pub use body::{empty, full, stream_file_body, ResponseBody, ScanHook};
