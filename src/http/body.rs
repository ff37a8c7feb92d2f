//! Response body module
//!
//! Unified body type for all responses plus the chunked file-read stream the
//! facade pipes to the transport, with optional meta-scanner observation.

use crate::logger;
use crate::meta::MetaScanner;
use bytes::BytesMut;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Bytes, Frame};
use std::io;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Body type shared by every response the facade constructs
pub type ResponseBody = BoxBody<Bytes, io::Error>;

/// File read chunk size
const CHUNK_SIZE: usize = 32 * 1024;

/// Body from an in-memory buffer
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Empty body
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// A meta scanner paired with the side effect to run on discovery.
///
/// Composed with the body stream instead of subclassing a transform: the
/// scanner observes each chunk and the callback fires at most once, on the
/// chunk that completes a match.
pub struct ScanHook {
    scanner: MetaScanner,
    on_discover: Option<Box<dyn FnOnce(String) + Send + Sync>>,
}

impl ScanHook {
    pub fn new(
        scanner: MetaScanner,
        on_discover: impl FnOnce(String) + Send + Sync + 'static,
    ) -> Self {
        Self {
            scanner,
            on_discover: Some(Box::new(on_discover)),
        }
    }

    fn observe(&mut self, chunk: &[u8]) {
        if let Some(value) = self.scanner.scan(chunk) {
            if let Some(callback) = self.on_discover.take() {
                callback(value);
            }
        }
    }
}

struct StreamState {
    file: File,
    path: PathBuf,
    hook: Option<ScanHook>,
    failed: bool,
}

/// Stream a file in 32 KiB chunks, forwarding every chunk unmodified and in
/// order. When a hook is supplied each chunk is shown to the scanner before
/// it is yielded.
///
/// A read error after streaming has begun cannot change the already-sent
/// status code: it is logged here and surfaces as a body error, which closes
/// the connection.
pub fn stream_file_body(file: File, path: PathBuf, hook: Option<ScanHook>) -> ResponseBody {
    let state = StreamState {
        file,
        path,
        hook,
        failed: false,
    };
    let stream = futures::stream::unfold(state, |mut state| async move {
        if state.failed {
            return None;
        }
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        match state.file.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                if let Some(hook) = state.hook.as_mut() {
                    hook.observe(&buf);
                }
                Some((Ok(Frame::data(buf.freeze())), state))
            }
            Err(err) => {
                logger::log_error(&format!(
                    "Read failed mid-stream for '{}': {err}",
                    state.path.display()
                ));
                state.failed = true;
                Some((Err(err), state))
            }
        }
    });
    BodyExt::boxed(StreamBody::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn collect(body: ResponseBody) -> Vec<u8> {
        body.collect().await.unwrap().to_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_stream_forwards_bytes_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        let html = b"<html><head><meta http-equiv=\"Cache-Control\" content=\"max-age=60\"></head></html>";
        std::fs::File::create(&path).unwrap().write_all(html).unwrap();

        let file = File::open(&path).await.unwrap();
        let hook = ScanHook::new(MetaScanner::new(65_536), |_| {});
        let body = stream_file_body(file, path, Some(hook));
        assert_eq!(collect(body).await, html);
    }

    #[tokio::test]
    async fn test_hook_fires_once_with_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        // two matching tags; the callback must still fire exactly once
        let html = b"<meta http-equiv=\"Cache-Control\" content=\"max-age=60\">\
                     <meta http-equiv=\"Cache-Control\" content=\"max-age=99\">";
        std::fs::File::create(&path).unwrap().write_all(html).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let file = File::open(&path).await.unwrap();
        let hook = ScanHook::new(MetaScanner::new(65_536), move |value| {
            assert_eq!(value, "max-age=60");
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });
        let body = stream_file_body(file, path, Some(hook));
        collect(body).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stream_without_hook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let data = vec![0xAB_u8; 100_000]; // spans multiple chunks
        std::fs::File::create(&path).unwrap().write_all(&data).unwrap();

        let file = File::open(&path).await.unwrap();
        let body = stream_file_body(file, path, None);
        assert_eq!(collect(body).await, data);
    }
}
