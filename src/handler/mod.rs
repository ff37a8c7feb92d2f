//! Request handling module
//!
//! Per-request entry point between the hyper connection and the responder
//! facade.

mod router;

pub use router::handle_request;
