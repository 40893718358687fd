//! The physical HTTP call.
//!
//! The client drives attempts; a [`Transport`] performs exactly one request per
//! `send` and reports what the server answered. Implementations must not retry
//! on their own and must not follow redirects, so every status reaches the
//! client's retry logic.

use crate::{Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// One physical request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, query string included.
    pub url: Url,
    /// The fully merged request headers.
    pub headers: HeaderMap,
    /// The encoded request body, if any.
    pub body: Option<String>,
    /// Timeout for this attempt.
    pub timeout: Duration,
}

/// What the server answered to one physical request.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body as text.
    pub body: String,
}

/// Issues physical HTTP requests.
///
/// # Examples
///
/// A transport that answers every request with a canned body, handy in tests:
///
/// ```
/// use async_trait::async_trait;
/// use http::{HeaderMap, StatusCode};
/// use rebound::transport::{Transport, TransportRequest, TransportResponse};
///
/// struct Canned;
///
/// #[async_trait]
/// impl Transport for Canned {
///     async fn send(&self, _request: TransportRequest) -> rebound::Result<TransportResponse> {
///         Ok(TransportResponse {
///             status: StatusCode::OK,
///             headers: HeaderMap::new(),
///             body: "{}".to_string(),
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] or [`Error::Network`] when no status code
    /// could be obtained.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// The default [`Transport`], backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with redirects disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying `reqwest` client cannot be built.
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { http_client })
    }

    /// Wraps an existing `reqwest` client.
    ///
    /// The client should be configured not to follow redirects.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}
