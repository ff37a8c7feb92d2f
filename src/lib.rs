//! metaserve - a static-asset HTTP responder with in-document cache-policy
//! discovery.
//!
//! Serves files over hyper/tokio and resolves a cache policy per response by
//! merging a server-wide default, a per-response override, and a `max-age`
//! discovered by scanning HTML payloads for an embedded
//! `<meta http-equiv="Cache-Control">` tag while they stream to the client.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod meta;
pub mod responder;
pub mod server;
