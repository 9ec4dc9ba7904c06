//! The two network operations of the pipeline: fetch an index page and
//! download an artifact.
//!
//! Both are plain futures over an injected [`HttpClient`]; dropping either
//! one abandons the request. The optional timeout bounds the whole
//! operation, body included.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::io::http::{FetchError, HttpClient};

/// A fetched index page and the URL its relative links resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    pub url: String,
    pub body: String,
}

#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClient>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `GET {base_url}/{package}`.
    ///
    /// Any failure (transport error, non-2xx status, non-UTF-8 body, timeout)
    /// is logged and reported as `None`, which callers treat as "not found".
    pub async fn fetch_index(&self, base_url: &str, package: &str) -> Option<IndexPage> {
        let url = format!("{}/{}", base_url.trim_end_matches('/'), package);

        let result = self
            .bounded(async {
                let response = self.client.get(&url).await?;
                if !response.is_success() {
                    return Err(FetchError::Status {
                        status: response.status,
                        url: url.clone(),
                    });
                }
                response.text().await
            })
            .await;

        match result {
            Ok(body) => {
                tracing::debug!(url = %url, bytes = body.len(), "fetched index page");
                Some(IndexPage { url, body })
            }
            Err(e) => {
                tracing::info!(package, "index lookup failed: {e}");
                None
            }
        }
    }

    /// Stream `url` into `dest`, replacing any existing file.
    ///
    /// When `expected_sha256` is given the body is hashed while streaming and
    /// a mismatch is an error. On any error the partial file is removed.
    /// Returns the number of bytes written.
    pub async fn download_artifact(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
    ) -> Result<u64, FetchError> {
        let result = self
            .bounded(stream_to_file(self.client.as_ref(), url, dest, expected_sha256))
            .await;
        if result.is_err() {
            tokio::fs::remove_file(dest).await.ok();
        }
        result
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| FetchError::Timeout(limit))?,
            None => operation.await,
        }
    }
}

async fn stream_to_file(
    client: &dyn HttpClient,
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
) -> Result<u64, FetchError> {
    let response = client.get(url).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            status: response.status,
            url: url.to_string(),
        });
    }

    let mut file = File::create(dest).await?;
    let mut stream = response.body;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }

    file.flush().await?;
    let actual_hash = hex::encode(hasher.finalize());

    if let Some(expected) = expected_sha256 {
        if !actual_hash.eq_ignore_ascii_case(expected) {
            return Err(FetchError::HashMismatch {
                expected: expected.to_string(),
                actual: actual_hash,
            });
        }
    }

    tracing::debug!(url, bytes = downloaded, sha256 = %actual_hash, "downloaded artifact");
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::http::ReqwestClient;
    use mockito::Server;

    fn fetcher() -> Fetcher {
        Fetcher::new(Arc::new(ReqwestClient::new(None).unwrap()))
    }

    #[tokio::test]
    async fn fetch_index_returns_body_and_page_url() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/simple/pkg")
            .with_status(200)
            .with_body("<a href=\"pkg-1.0-py3-none-any.whl\">pkg-1.0-py3-none-any.whl</a>")
            .create_async()
            .await;

        let base = format!("{}/simple/", server.url());
        let page = fetcher().fetch_index(&base, "pkg").await.unwrap();
        assert_eq!(page.url, format!("{}/simple/pkg", server.url()));
        assert!(page.body.contains("pkg-1.0-py3-none-any.whl"));
    }

    #[tokio::test]
    async fn fetch_index_maps_failures_to_none() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/simple/nope")
            .with_status(404)
            .create_async()
            .await;
        let _binary = server
            .mock("GET", "/simple/binary")
            .with_status(200)
            .with_body(vec![0xff, 0xfe, 0xfd])
            .create_async()
            .await;

        let base = format!("{}/simple", server.url());
        let fetcher = fetcher();
        assert!(fetcher.fetch_index(&base, "nope").await.is_none());
        assert!(fetcher.fetch_index(&base, "binary").await.is_none());
        assert!(
            fetcher
                .fetch_index("http://127.0.0.1:1/simple", "pkg")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn download_writes_and_verifies() {
        let mut server = Server::new_async().await;
        let body = b"wheel bytes".to_vec();
        let digest = hex::encode(Sha256::digest(&body));
        let _m = server
            .mock("GET", "/files/pkg.whl")
            .with_status(200)
            .with_body(body.clone())
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.whl");
        std::fs::write(&dest, b"stale contents that are longer than the body").unwrap();

        let url = format!("{}/files/pkg.whl", server.url());
        let written = fetcher()
            .download_artifact(&url, &dest, Some(&digest))
            .await
            .unwrap();
        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);

        let err = fetcher()
            .download_artifact(&url, &dest, Some(&"0".repeat(64)))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HashMismatch { .. }));
        assert!(!dest.exists());
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl HttpClient for Unreachable {
        async fn get(&self, url: &str) -> Result<crate::io::http::HttpResponse, FetchError> {
            Err(FetchError::Transport(format!("{url}: connection refused")))
        }
    }

    #[tokio::test]
    async fn custom_client_transport_errors_are_contained() {
        let fetcher = Fetcher::new(Arc::new(Unreachable));
        assert!(fetcher.fetch_index("https://index.test/simple", "pkg").await.is_none());

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pkg.whl");
        let err = fetcher
            .download_artifact("https://index.test/pkg.whl", &dest, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert!(err.to_string().contains("connection refused"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn download_rejects_error_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/files/gone.whl")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("gone.whl");
        let url = format!("{}/files/gone.whl", server.url());
        let err = fetcher().download_artifact(&url, &dest, None).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, .. }));
        assert!(!dest.exists());
    }
}
