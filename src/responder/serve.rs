//! Static serving module
//!
//! Path resolution with containment checking, default-document probing,
//! listing fallback, and the streaming file sender with its conditional-GET
//! and cache-policy logic.

use super::{listing, Responder, SendOptions};
use crate::http::cache::{self, CachePolicy};
use crate::http::{self, mime, ScanHook};
use crate::logger;
use crate::meta::MetaScanner;
use chrono::Utc;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

impl Responder {
    /// Entry point for static serving: resolve `requested` inside `root` and
    /// answer with a file, a default document, a listing, or an error page.
    pub async fn serve_dir(&self, root: &Path, requested: &str) -> Response<http::ResponseBody> {
        let Ok(root) = fs::canonicalize(root).await else {
            return self.send_error_page(StatusCode::NOT_FOUND, "Directory not found");
        };

        let Some(joined) = join_within(&root, requested) else {
            logger::log_warning(&format!("Path traversal attempt blocked: {requested}"));
            return self.send_error_page(StatusCode::NOT_FOUND, "404 Not Found");
        };

        // Canonicalize before the containment check so symlink escapes are
        // caught as well
        let target = match fs::canonicalize(&joined).await {
            Ok(target) => target,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return self.send_error_page(StatusCode::NOT_FOUND, "404 Not Found");
            }
            Err(e) => {
                logger::log_error(&format!(
                    "Failed to resolve '{}': {e}",
                    joined.display()
                ));
                return self.send_error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                );
            }
        };
        if !target.starts_with(&root) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {requested} -> {}",
                target.display()
            ));
            return self.send_error_page(StatusCode::NOT_FOUND, "404 Not Found");
        }

        let metadata = match fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return self.send_error_page(StatusCode::NOT_FOUND, "404 Not Found");
            }
            Err(e) => {
                logger::log_error(&format!("Failed to stat '{}': {e}", target.display()));
                return self.send_error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                );
            }
        };

        if metadata.is_dir() {
            for name in &self.state().default_files {
                let candidate = target.join(name);
                if let Ok(candidate_meta) = fs::metadata(&candidate).await {
                    if candidate_meta.is_file() {
                        return self.stream_file(candidate).await;
                    }
                }
            }
            return self.render_listing(&target, requested).await;
        }

        self.stream_file(target).await
    }

    /// Stream a file to the client, or answer 304 without touching the
    /// filesystem when the conditional check hits.
    pub async fn stream_file(&self, path: PathBuf) -> Response<http::ResponseBody> {
        let directives = cache::parse_cache_control(self.request().cache_control.as_deref());
        let stored = self.state().policy_store.get(&path);
        let effective = cache::resolve_effective(self.explicit_max_age(), &directives, stored);

        if let Some(ims) = self.request().if_modified_since.as_deref() {
            if cache::conditional_hit(ims, effective.max_age, Utc::now().timestamp()) {
                let mut response = self.send(
                    Bytes::from_static(b"Not Modified"),
                    SendOptions::with_type(StatusCode::NOT_MODIFIED, "text/plain; charset=utf-8"),
                );
                response.extensions_mut().insert(effective.source);
                return response;
            }
        }

        let content_type =
            mime::get_content_type(path.extension().and_then(|e| e.to_str()));

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            // the file vanished between stat and open
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return self.send_error_page(StatusCode::NOT_FOUND, "File not found");
            }
            Err(e) => {
                logger::log_error(&format!("Failed to open '{}': {e}", path.display()));
                return self
                    .send_error_page(StatusCode::INTERNAL_SERVER_ERROR, "Server error");
            }
        };

        // Scan HTML payloads that have no store entry yet; the discovery
        // annotates the store for future requests, never this response
        let hook = if mime::is_html(content_type) && stored.is_none() {
            let state = Arc::clone(self.state());
            let key = path.clone();
            let scanner = MetaScanner::new(self.state().config.serve.scan_limit);
            Some(ScanHook::new(scanner, move |value| {
                let discovered = cache::parse_cache_control(Some(&value));
                let max_age = discovered.max_age();
                logger::log_policy_discovered(&key, max_age);
                state.policy_store.discover(key, CachePolicy { max_age });
            }))
        } else {
            None
        };

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", content_type)
            .header("Server", self.state().config.http.server_name.as_str());
        if effective.max_age != 0 {
            builder = builder
                .header("Cache-Control", format!("max-age={}", effective.max_age))
                .header("Last-Modified", cache::http_date(Utc::now()));
        }
        builder = self.apply_cors(builder);
        for (name, value) in &self.pending_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = http::stream_file_body(file, path, hook);
        let mut response = builder.body(body).unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build file response: {e}"));
            Response::new(http::empty())
        });
        response.extensions_mut().insert(effective.source);
        response
    }

    async fn render_listing(&self, dir: &Path, requested: &str) -> Response<http::ResponseBody> {
        let mut read_dir = match fs::read_dir(dir).await {
            Ok(read_dir) => read_dir,
            Err(e) => {
                logger::log_error(&format!("Failed to list '{}': {e}", dir.display()));
                return self.send_error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                );
            }
        };

        let mut entries = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|t| t.is_dir())
                        .unwrap_or(false);
                    entries.push((name, is_dir));
                }
                Ok(None) => break,
                Err(e) => {
                    logger::log_error(&format!("Failed to list '{}': {e}", dir.display()));
                    return self.send_error_page(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error",
                    );
                }
            }
        }

        let html = listing::render(requested, &entries);
        self.send(
            Bytes::from(html),
            SendOptions::with_type(StatusCode::OK, "text/html; charset=utf-8"),
        )
    }
}

/// Join `requested` under `root`, refusing parent, root, and prefix
/// components outright
fn join_within(root: &Path, requested: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(requested.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppState, Config};
    use crate::http::cache::PolicySource;
    use crate::responder::RequestInfo;
    use http_body_util::BodyExt;
    use std::io::Write;

    fn test_state() -> Arc<AppState> {
        let config = Config::load_from("nonexistent-config-file").unwrap();
        Arc::new(AppState::new(config))
    }

    fn responder_with(state: Arc<AppState>, request: RequestInfo) -> Responder {
        Responder::new(state, request)
    }

    async fn body_string(response: Response<http::ResponseBody>) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn write_file(path: &Path, content: &[u8]) {
        std::fs::File::create(path).unwrap().write_all(content).unwrap();
    }

    #[test]
    fn test_join_within_rejects_escapes() {
        let root = Path::new("/srv/www");
        assert!(join_within(root, "../etc/passwd").is_none());
        assert!(join_within(root, "a/../../b").is_none());
        assert_eq!(
            join_within(root, "docs/./page.html"),
            Some(PathBuf::from("/srv/www/docs/page.html"))
        );
        assert_eq!(join_within(root, ""), Some(PathBuf::from("/srv/www")));
    }

    #[tokio::test]
    async fn test_missing_root_is_404() {
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder
            .serve_dir(Path::new("/definitely/not/a/dir"), "")
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("Directory not found"));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "missing.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("404 Not Found"));
    }

    #[tokio::test]
    async fn test_traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "../../etc/passwd").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_regular_file_is_streamed() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("hello.txt"), b"hello world");
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "hello.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "hello world");
    }

    #[tokio::test]
    async fn test_unknown_extension_is_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("blob.xyz"), b"\x00\x01");
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "blob.xyz").await;
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_directory_serves_default_document() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("index.html"), b"<h1>home</h1>");
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "<h1>home</h1>");
    }

    #[tokio::test]
    async fn test_directory_without_default_document_lists_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a.txt"), b"a");
        write_file(&dir.path().join("b.txt"), b"b");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert_eq!(html.matches("<li>").count(), 3);
        assert!(html.contains(">sub/</a>"));
    }

    #[tokio::test]
    async fn test_conditional_hit_returns_304_without_opening_file() {
        let dir = tempfile::tempdir().unwrap();
        // the path does not even exist: a hit must short-circuit before any
        // filesystem access
        let missing = dir.path().join("gone.html");

        let state = test_state();
        let request = RequestInfo {
            if_modified_since: Some(cache::http_date(Utc::now())),
            ..RequestInfo::default()
        };
        let mut responder = responder_with(state, request);
        responder.set_max_age(60);

        let response = responder.stream_file(missing).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(body_string(response).await, "Not Modified");
    }

    #[tokio::test]
    async fn test_stale_conditional_sends_full_response() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("page.txt"), b"fresh bytes");

        let stale = Utc::now() - chrono::Duration::seconds(3600);
        let request = RequestInfo {
            if_modified_since: Some(cache::http_date(stale)),
            ..RequestInfo::default()
        };
        let mut responder = responder_with(test_state(), request);
        responder.set_max_age(60);

        let response = responder.serve_dir(dir.path(), "page.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "fresh bytes");
    }

    #[tokio::test]
    async fn test_request_max_age_enables_conditional_hit() {
        // no explicit override; the request's own Cache-Control supplies the
        // max-age used for the conditional check
        let request = RequestInfo {
            cache_control: Some("max-age=120".to_string()),
            if_modified_since: Some(cache::http_date(Utc::now())),
            ..RequestInfo::default()
        };
        let responder = responder_with(test_state(), request);
        let response = responder.stream_file(PathBuf::from("/nowhere.bin")).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            response.extensions().get::<PolicySource>(),
            Some(&PolicySource::Request)
        );
    }

    #[tokio::test]
    async fn test_cache_headers_emitted_when_policy_nonzero() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("page.txt"), b"x");
        let mut responder = responder_with(test_state(), RequestInfo::default());
        responder.set_max_age(300);
        let response = responder.serve_dir(dir.path(), "page.txt").await;
        assert_eq!(
            response.headers().get("cache-control").unwrap(),
            "max-age=300"
        );
        assert!(response.headers().contains_key("last-modified"));
    }

    #[tokio::test]
    async fn test_no_cache_headers_when_policy_zero() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("page.txt"), b"x");
        let responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "page.txt").await;
        assert!(response.headers().get("cache-control").is_none());
        assert!(response.headers().get("last-modified").is_none());
    }

    #[tokio::test]
    async fn test_html_scan_populates_store_for_next_request() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            &dir.path().join("index.html"),
            b"<html><head><meta http-equiv=\"Cache-Control\" content=\"max-age=120\"></head>\
              <body>welcome</body></html>",
        );

        let state = test_state();

        // first request: streams and scans; its own response carries no
        // cache headers because discovery lands after header emission
        let responder = responder_with(Arc::clone(&state), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "index.html").await;
        assert!(response.headers().get("cache-control").is_none());
        // draining the body drives the scan
        let html = body_string(response).await;
        assert!(html.contains("welcome"));

        let key = fs::canonicalize(dir.path().join("index.html")).await.unwrap();
        assert_eq!(state.policy_store.get(&key), Some(CachePolicy { max_age: 120 }));

        // second request benefits from the discovered policy
        let responder = responder_with(Arc::clone(&state), RequestInfo::default());
        let response = responder.serve_dir(dir.path(), "index.html").await;
        assert_eq!(
            response.headers().get("cache-control").unwrap(),
            "max-age=120"
        );
        assert_eq!(
            response.extensions().get::<PolicySource>(),
            Some(&PolicySource::Discovered)
        );
    }

    #[tokio::test]
    async fn test_discovered_zero_is_not_rescanned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        write_file(
            &path,
            b"<html><head><meta http-equiv=\"Cache-Control\" content=\"no-store\"></head></html>",
        );

        let state = test_state();
        let responder = responder_with(Arc::clone(&state), RequestInfo::default());
        let key = fs::canonicalize(&path).await.unwrap();
        let response = responder.stream_file(key.clone()).await;
        body_string(response).await;

        // no max-age directive in the tag: recorded as a final zero
        assert_eq!(state.policy_store.get(&key), Some(CachePolicy { max_age: 0 }));

        // rewrite the file with a real directive; the stale zero still wins
        write_file(
            &path,
            b"<html><head><meta http-equiv=\"Cache-Control\" content=\"max-age=600\"></head></html>",
        );
        let responder = responder_with(Arc::clone(&state), RequestInfo::default());
        let response = responder.stream_file(key.clone()).await;
        assert!(response.headers().get("cache-control").is_none());
        body_string(response).await;
        assert_eq!(state.policy_store.get(&key), Some(CachePolicy { max_age: 0 }));
    }

    #[tokio::test]
    async fn test_non_html_is_not_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        write_file(
            &path,
            b"<meta http-equiv=\"Cache-Control\" content=\"max-age=120\">",
        );

        let state = test_state();
        let responder = responder_with(Arc::clone(&state), RequestInfo::default());
        let key = fs::canonicalize(&path).await.unwrap();
        let response = responder.stream_file(key.clone()).await;
        body_string(response).await;
        assert!(state.policy_store.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_download_sets_content_disposition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_file(&path, b"%PDF-");
        let mut responder = responder_with(test_state(), RequestInfo::default());
        let response = responder.download(path, "report.pdf").await;
        assert_eq!(
            response.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"report.pdf\""
        );
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/pdf"
        );
    }
}
