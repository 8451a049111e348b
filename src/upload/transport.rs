//! HTTP transport for transfers.
//!
//! The [`Transport`] trait is the contract the executor relies on: send one
//! multipart request, report body progress, and return the raw response.
//! [`HttpTransport`] is the `reqwest` implementation.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use futures_util::stream;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{
    ACCEPT, CACHE_CONTROL, COOKIE, HeaderMap, HeaderName, HeaderValue, SET_COOKIE,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method};
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    AJAX_MARKER_HEADER, AJAX_MARKER_VALUE, CONNECT_TIMEOUT_SECS, FILE_FIELD_NAME,
    REQUEST_TIMEOUT_SECS, STREAM_CHUNK_SIZE,
};
use super::error::TransferError;
use super::file::Payload;
use super::progress::{ProgressReporter, ProgressStream};

/// Everything needed to send one file.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Whether credentials (cookies) accompany the request.
    pub with_credentials: bool,
    /// Final header set, defaults already merged.
    pub headers: HeaderMap,
    /// Extra form fields, sent after the payload.
    pub params: Vec<(String, String)>,
    /// Original file name for the payload part.
    pub file_name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// The payload itself.
    pub payload: Payload,
}

/// Raw outcome of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Canonical reason phrase for the status, may be empty.
    pub status_text: String,
    /// Response body as text, may be empty.
    pub body: String,
}

/// Sends one upload request.
///
/// Implementations must be cancel-safe: the executor drops the returned
/// future when a transfer is canceled.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends the request, reporting body progress through `progress`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] when no HTTP response was received.
    async fn send(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse, TransferError>;
}

/// Builds the request header set: defaults first, then caller headers,
/// which replace a default of the same name.
#[must_use]
pub fn merge_headers(custom: &[(HeaderName, HeaderValue)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static(AJAX_MARKER_HEADER),
        HeaderValue::from_static(AJAX_MARKER_VALUE),
    );

    for (name, value) in custom {
        headers.insert(name.clone(), value.clone());
    }
    headers
}

/// `reqwest`-backed transport.
///
/// Created once and shared by every executor, taking advantage of
/// connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    cookies: Arc<Jar>,
}

impl HttpTransport {
    /// Creates a transport with default timeouts and an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidOptions`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, TransferError> {
        Self::with_cookie_jar(Arc::new(Jar::default()))
    }

    /// Creates a transport sharing the given cookie jar.
    ///
    /// Cookies in the jar are only attached to requests made with
    /// credentials enabled.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidOptions`] if the HTTP client cannot be built.
    pub fn with_cookie_jar(cookies: Arc<Jar>) -> Result<Self, TransferError> {
        Self::with_cookie_jar_and_timeouts(cookies, CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidOptions`] if the HTTP client cannot be built.
    pub fn with_cookie_jar_and_timeouts(
        cookies: Arc<Jar>,
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
    ) -> Result<Self, TransferError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .user_agent(default_upload_user_agent())
            .build()
            .map_err(|e| TransferError::invalid_options(format!("HTTP client: {e}")))?;
        Ok(Self { client, cookies })
    }

    /// Returns the cookie jar used for credentialed requests.
    #[must_use]
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request, progress), fields(url = %request.url, file = %request.file_name))]
    async fn send(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse, TransferError> {
        let url =
            Url::parse(&request.url).map_err(|_| TransferError::invalid_url(request.url.clone()))?;

        let chunks = payload_stream(&request.payload).await?;
        let body = Body::wrap_stream(ProgressStream::new(chunks, progress, request.size));
        let file_part = Part::stream_with_length(body, request.size).file_name(request.file_name);

        let mut form = Form::new().part(FILE_FIELD_NAME, file_part);
        for (name, value) in request.params {
            form = form.text(name, value);
        }

        let mut builder = self
            .client
            .request(request.method, url.clone())
            .headers(request.headers)
            .multipart(form);
        if request.with_credentials
            && let Some(cookie_header) = self.cookies.cookies(&url)
        {
            builder = builder.header(COOKIE, cookie_header);
        }

        debug!("sending upload request");
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransferError::timeout(url.as_str())
            } else {
                TransferError::network(url.as_str(), e)
            }
        })?;

        if request.with_credentials {
            let mut set_cookies = response.headers().get_all(SET_COOKIE).iter();
            self.cookies.set_cookies(&mut set_cookies, &url);
        }

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "upload response received");

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

async fn payload_stream(payload: &Payload) -> Result<ChunkStream, TransferError> {
    match payload {
        Payload::Bytes(content) => {
            let content = content.clone();
            let chunks: Vec<std::io::Result<Bytes>> = (0..content.len())
                .step_by(STREAM_CHUNK_SIZE)
                .map(|start| {
                    let end = (start + STREAM_CHUNK_SIZE).min(content.len());
                    Ok(content.slice(start..end))
                })
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
        Payload::Path(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| TransferError::io(path.clone(), e))?;
            Ok(Box::pin(ReaderStream::with_capacity(
                file,
                STREAM_CHUNK_SIZE,
            )))
        }
    }
}

/// Default User-Agent for upload requests (identifies the tool).
fn default_upload_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("uploader/{version}")
}
