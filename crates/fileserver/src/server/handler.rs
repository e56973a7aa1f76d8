//! Method dispatch and the GET/POST operations.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use tokio::fs::{self, File};
use tracing::{info, warn};

use super::error::RequestError;
use crate::config::ServerConfig;
use crate::files::{download_body, list_directory, render_listing, resolve_url_path, upload};

/// The request methods the server distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    /// Download a file or list a directory.
    Get,
    /// Upload a file.
    Post,
    /// Anything else; answered with 405.
    Other(Method),
}

impl From<&Method> for RequestMethod {
    fn from(method: &Method) -> Self {
        if method == Method::GET {
            RequestMethod::Get
        } else if method == Method::POST {
            RequestMethod::Post
        } else {
            RequestMethod::Other(method.clone())
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestMethod::Get => f.write_str("GET"),
            RequestMethod::Post => f.write_str("POST"),
            RequestMethod::Other(method) => f.write_str(method.as_str()),
        }
    }
}

/// Serves one directory tree.
///
/// Cheap to clone; every clone shares the same immutable configuration.
#[derive(Debug, Clone)]
pub struct FileServer {
    config: Arc<ServerConfig>,
}

impl FileServer {
    /// Create a server for `config`.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The configuration this server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The absolute directory being served.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Handle a single request.
    ///
    /// `peer` is the remote address when the transport provides one.
    /// `raw_path` is the URL path as received, still percent-encoded. The
    /// response status is decided only once the outcome is known.
    pub async fn handle(
        &self,
        method: RequestMethod,
        peer: Option<&str>,
        raw_path: &str,
        body: Body,
    ) -> Response {
        info!("{} {} {}", method, peer.unwrap_or("-"), raw_path);

        let result = match method {
            RequestMethod::Get => self.get(raw_path).await,
            RequestMethod::Post => self.post(raw_path, body).await,
            RequestMethod::Other(_) => Err(RequestError::MethodNotAllowed),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                warn!("{} {} failed: {}", method, raw_path, e);
                e.into_response()
            }
        }
    }

    async fn get(&self, raw_path: &str) -> Result<Response, RequestError> {
        let item = resolve_url_path(self.root(), raw_path)?;

        let metadata = fs::metadata(&item)
            .await
            .map_err(RequestError::StatFailure)?;

        if metadata.is_dir() {
            let entries = list_directory(&item, raw_path)
                .await
                .map_err(RequestError::ListFailure)?;
            let page = render_listing(&item, &entries, self.config.writable());
            return Ok(Html(page).into_response());
        }

        // Opening a FIFO or device would block until a writer shows up.
        if !metadata.is_file() {
            return Err(RequestError::NotARegularFile);
        }

        let file = File::open(&item).await.map_err(RequestError::OpenFailure)?;

        let mut response = download_body(file).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        Ok(response)
    }

    async fn post(&self, raw_path: &str, body: Body) -> Result<Response, RequestError> {
        // Refuse before looking at the path so nothing touches the disk.
        if !self.config.writable() {
            return Err(RequestError::WriteForbidden);
        }

        let item = resolve_url_path(self.root(), raw_path)?;

        if let Ok(metadata) = fs::metadata(&item).await {
            if metadata.is_dir() {
                return Err(RequestError::ExistingDirectoryConflict);
            }
        }

        let written = upload(&item, body.into_data_stream()).await?;
        info!("Stored {} ({} bytes)", item.display(), written);

        Ok(StatusCode::OK.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::fs as stdfs;
    use tempfile::TempDir;

    fn server(dir: &TempDir, writable: bool) -> FileServer {
        FileServer::new(ServerConfig::new(dir.path(), writable).unwrap())
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Drop all permission bits on `path`. Returns false when they are not
    /// enforced, as for root.
    #[cfg(unix)]
    fn lock(path: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;

        stdfs::set_permissions(path, stdfs::Permissions::from_mode(0o000)).unwrap();
        let enforced = if path.is_dir() {
            stdfs::read_dir(path).is_err()
        } else {
            stdfs::File::open(path).is_err()
        };
        if !enforced {
            unlock(path);
        }
        enforced
    }

    #[cfg(unix)]
    fn unlock(path: &Path) {
        use std::os::unix::fs::PermissionsExt;

        stdfs::set_permissions(path, stdfs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_request_method_from_http() {
        assert_eq!(RequestMethod::from(&Method::GET), RequestMethod::Get);
        assert_eq!(RequestMethod::from(&Method::POST), RequestMethod::Post);
        assert_eq!(
            RequestMethod::from(&Method::DELETE),
            RequestMethod::Other(Method::DELETE)
        );
        assert_eq!(RequestMethod::Other(Method::PUT).to_string(), "PUT");
    }

    #[tokio::test]
    async fn test_get_directory_lists_children() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::create_dir_all(temp_dir.path().join("docs/inner")).unwrap();
        stdfs::write(temp_dir.path().join("docs/a.txt"), "a").unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/docs", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        let html = body_string(response).await;
        let expected_heading = format!("Files in {}", temp_dir.path().join("docs").display());
        assert!(html.contains(&expected_heading));
        assert!(html.contains("<a href=\"/docs/inner\">inner</a>"));
        assert!(html.contains("<a href=\"/docs/a.txt\">a.txt</a>"));
        assert_eq!(html.matches("<li>").count(), 2);
        assert!(!html.contains("<input type=\"file\""));
    }

    #[tokio::test]
    async fn test_get_listing_links_stay_on_host() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        stdfs::write(temp_dir.path().join("sub/a.txt"), "a").unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "//sub", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("<li><a href=\"/sub/a.txt\">a.txt</a></li>"));
        assert!(!html.contains("href=\"//"));
    }

    #[tokio::test]
    async fn test_get_root_shows_upload_form_when_writable() {
        let temp_dir = TempDir::new().unwrap();

        let response = server(&temp_dir, true)
            .handle(RequestMethod::Get, None, "/", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("<input type=\"file\""));
    }

    #[tokio::test]
    async fn test_get_file_streams_contents() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::write(temp_dir.path().join("hello.txt"), "Hello World").unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/hello.txt", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(body_string(response).await, "Hello World");
    }

    #[tokio::test]
    async fn test_get_percent_encoded_name() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::write(temp_dir.path().join("my file.txt"), "spaced").unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/my%20file.txt", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "spaced");
    }

    #[tokio::test]
    async fn test_get_escape_rejected() {
        let temp_dir = TempDir::new().unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/a/../../etc/passwd", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "nice try!");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/missing.txt", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.starts_with("can't stat item: "));
    }

    #[tokio::test]
    async fn test_get_stat_failure_other_than_missing() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::write(temp_dir.path().join("file.txt"), "x").unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/file.txt/child", Body::empty())
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.starts_with("can't stat item: "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_get_unlistable_directory() {
        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        stdfs::create_dir(&locked).unwrap();
        if !lock(&locked) {
            return;
        }

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/locked", Body::empty())
            .await;
        unlock(&locked);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response)
            .await
            .starts_with("can't list folder entries: "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_get_unreadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let secret = temp_dir.path().join("secret.txt");
        stdfs::write(&secret, "hidden").unwrap();
        if !lock(&secret) {
            return;
        }

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Get, None, "/secret.txt", Body::empty())
            .await;
        unlock(&secret);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response)
            .await
            .starts_with("can't open file to be read: "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_get_fifo_is_refused_without_blocking() {
        use nix::sys::stat::Mode;

        let temp_dir = TempDir::new().unwrap();
        nix::unistd::mkfifo(&temp_dir.path().join("pipe"), Mode::S_IRWXU).unwrap();

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            server(&temp_dir, false).handle(RequestMethod::Get, None, "/pipe", Body::empty()),
        )
        .await
        .expect("GET on a fifo blocked");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "not a regular file");
    }

    #[tokio::test]
    async fn test_post_forbidden_when_read_only() {
        let temp_dir = TempDir::new().unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Post, None, "/x.txt", Body::from("data"))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_string(response).await, "i'm afraid i can't do that");
        assert!(!temp_dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn test_post_forbidden_before_path_check() {
        let temp_dir = TempDir::new().unwrap();

        let response = server(&temp_dir, false)
            .handle(RequestMethod::Post, None, "/../../escape.txt", Body::from("data"))
            .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_post_creates_nested_file() {
        let temp_dir = TempDir::new().unwrap();
        let server = server(&temp_dir, true);

        let response = server
            .handle(RequestMethod::Post, None, "/new/deep/file.txt", Body::from("hello"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.is_empty());
        assert!(temp_dir.path().join("new/deep").is_dir());
        assert_eq!(
            stdfs::read_to_string(temp_dir.path().join("new/deep/file.txt")).unwrap(),
            "hello"
        );

        let response = server
            .handle(RequestMethod::Get, None, "/new/deep/file.txt", Body::empty())
            .await;
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn test_post_existing_directory_rejected() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::create_dir_all(temp_dir.path().join("folder/child")).unwrap();

        let response = server(&temp_dir, true)
            .handle(RequestMethod::Post, None, "/folder", Body::from("data"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_string(response).await,
            "path should not be a existing folder"
        );
        assert!(temp_dir.path().join("folder/child").is_dir());
        assert_eq!(stdfs::read_dir(temp_dir.path().join("folder")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_post_escape_rejected() {
        let temp_dir = TempDir::new().unwrap();

        let response = server(&temp_dir, true)
            .handle(RequestMethod::Post, None, "/../outside.txt", Body::from("data"))
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "nice try!");
        assert!(!temp_dir.path().parent().unwrap().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_post_parent_is_file() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::write(temp_dir.path().join("blocker"), "x").unwrap();

        let response = server(&temp_dir, true)
            .handle(RequestMethod::Post, None, "/blocker/child.txt", Body::from("data"))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response)
            .await
            .starts_with("can't create parent directory: "));
    }

    #[tokio::test]
    async fn test_other_method_not_allowed() {
        let temp_dir = TempDir::new().unwrap();
        stdfs::write(temp_dir.path().join("keep.txt"), "x").unwrap();

        let response = server(&temp_dir, true)
            .handle(
                RequestMethod::Other(Method::DELETE),
                Some("100.64.0.2:51000"),
                "/keep.txt",
                Body::empty(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(temp_dir.path().join("keep.txt").exists());
    }
}
