//! HTTP capability consumed by the fetcher.
//!
//! The pipeline only needs `GET url -> (status, body stream)`. Non-success
//! statuses are returned, not raised; the caller decides what they mean.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("response body is not valid UTF-8")]
    Decode,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Connection-level failure reported by an [`HttpClient`] that is not
    /// backed by reqwest.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Streamed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Status plus a body that has not been read yet.
pub struct HttpResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub fn new(status: u16, body: ByteStream) -> Self {
        Self { status, body }
    }

    /// A response whose whole body is already in memory.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::new(
            status,
            stream::once(async move { Ok::<_, FetchError>(body) }).boxed(),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body.
    pub async fn bytes(self) -> Result<Bytes, FetchError> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(chunks.concat().into())
    }

    /// Read the whole body as UTF-8 text.
    pub async fn text(self) -> Result<String, FetchError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FetchError::Decode)
    }
}

/// A `GET`-only HTTP client that is safe to share between concurrent tasks.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a `GET`. Only transport failures are errors; any status is `Ok`.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// [`HttpClient`] backed by `reqwest`'s pooled client.
///
/// A trusted host gets its own client that skips certificate verification;
/// every other host goes through the strict one.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    strict: reqwest::Client,
    trusted: Option<(String, reqwest::Client)>,
}

impl ReqwestClient {
    /// Build the client pair.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(trusted_host: Option<&str>) -> Result<Self, FetchError> {
        let strict = Self::builder().build()?;
        let trusted = match trusted_host {
            Some(host) => {
                tracing::warn!(host, "certificate verification disabled for trusted host");
                let client = Self::builder().danger_accept_invalid_certs(true).build()?;
                Some((host.to_ascii_lowercase(), client))
            }
            None => None,
        };
        Ok(Self { strict, trusted })
    }

    fn builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .pool_max_idle_per_host(20)
    }

    fn client_for(&self, url: &str) -> &reqwest::Client {
        if let Some((host, client)) = &self.trusted {
            let matches = reqwest::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
                .is_some_and(|h| &h == host);
            if matches {
                return client;
            }
        }
        &self.strict
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self.client_for(url).get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes_stream().map_err(FetchError::from).boxed();
        Ok(HttpResponse::new(status, body))
    }
}
