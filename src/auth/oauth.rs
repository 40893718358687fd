//! OAuth 2.0 client-credentials grant.

use super::{authorization_header, AuthStrategy, TokenCache, TokenFuture};
use crate::config::DEFAULT_TIMEOUT;
use crate::error::AuthError;
use crate::transport::{ReqwestTransport, Transport, TransportRequest};
use crate::Result;
use async_trait::async_trait;
use futures::FutureExt;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Obtains bearer tokens from an OAuth 2.0 token endpoint using the
/// client-credentials grant.
///
/// The token request is a plain `application/x-www-form-urlencoded` POST sent
/// through its own transport, without any authentication of its own and
/// without retries. Tokens are cached and concurrent callers share a single
/// fetch, like [`DelegatedAuth`](super::DelegatedAuth).
///
/// # Examples
///
/// ```no_run
/// use rebound::auth::OAuthClientCredentials;
/// use rebound::Client;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), rebound::Error> {
/// let auth = OAuthClientCredentials::new(
///     "https://auth.example.com/oauth/token",
///     "my-client",
///     "my-secret",
/// )?
/// .audience("https://api.example.com");
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .auth_strategy(Arc::new(auth))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct OAuthClientCredentials {
    endpoint: Arc<TokenEndpoint>,
    cache: TokenCache,
}

struct TokenEndpoint {
    url: Url,
    client_id: String,
    client_secret: String,
    audience: Option<String>,
    timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl OAuthClientCredentials {
    /// Creates a strategy for the given token endpoint and client.
    ///
    /// # Errors
    ///
    /// Returns an error if `token_url` is not a valid URL or the default
    /// transport cannot be built.
    pub fn new(
        token_url: impl AsRef<str>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = TokenEndpoint {
            url: Url::parse(token_url.as_ref())?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: None,
            timeout: DEFAULT_TIMEOUT,
            transport: Arc::new(ReqwestTransport::new()?),
        };
        Ok(Self {
            endpoint: Arc::new(endpoint),
            cache: TokenCache::default(),
        })
    }

    /// Requests tokens for the given audience.
    pub fn audience(self, audience: impl Into<String>) -> Self {
        let audience = Some(audience.into());
        self.with_endpoint(|endpoint| endpoint.audience = audience)
    }

    /// Sets the timeout of the token request.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.with_endpoint(|endpoint| endpoint.timeout = timeout)
    }

    /// Sends token requests through `transport` instead of the default one.
    pub fn transport(self, transport: Arc<dyn Transport>) -> Self {
        self.with_endpoint(|endpoint| endpoint.transport = transport)
    }

    fn with_endpoint(self, update: impl FnOnce(&mut TokenEndpoint)) -> Self {
        let mut endpoint = match Arc::try_unwrap(self.endpoint) {
            Ok(endpoint) => endpoint,
            Err(shared) => shared.duplicate(),
        };
        update(&mut endpoint);
        Self {
            endpoint: Arc::new(endpoint),
            cache: TokenCache::default(),
        }
    }

    fn start_fetch(&self) -> TokenFuture {
        let endpoint = Arc::clone(&self.endpoint);
        async move { endpoint.request_token().await }.boxed()
    }
}

impl TokenEndpoint {
    fn duplicate(&self) -> Self {
        Self {
            url: self.url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            audience: self.audience.clone(),
            timeout: self.timeout,
            transport: Arc::clone(&self.transport),
        }
    }

    fn form_body(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret);
        if let Some(audience) = &self.audience {
            form.append_pair("audience", audience);
        }
        form.finish()
    }

    async fn request_token(&self) -> std::result::Result<String, AuthError> {
        tracing::debug!(token_url = %self.url, "Requesting client-credentials token");

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let request = TransportRequest {
            method: Method::POST,
            url: self.url.clone(),
            headers,
            body: Some(self.form_body()),
            timeout: self.timeout,
        };

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(error = %e, token_url = %self.url, "Token request failed");
            AuthError::Fetch(e.to_string())
        })?;

        if !response.status.is_success() {
            tracing::warn!(
                status = response.status.as_u16(),
                token_url = %self.url,
                "Token endpoint rejected the request"
            );
            return Err(AuthError::TokenEndpoint {
                status: response.status,
                body: response.body,
            });
        }

        serde_json::from_str::<Value>(&response.body)
            .ok()
            .as_ref()
            .and_then(|json| json.get("access_token"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(AuthError::MissingAccessToken)
    }
}

#[async_trait]
impl AuthStrategy for OAuthClientCredentials {
    async fn auth_headers(&self) -> std::result::Result<HeaderMap, AuthError> {
        let token = self.cache.get_or_fetch(|| self.start_fetch()).await?;
        authorization_header(&format!("Bearer {}", token))
    }

    async fn refresh_token(&self) -> std::result::Result<(), AuthError> {
        self.cache.refresh(|| self.start_fetch()).await.map(|_| ())
    }
}

impl fmt::Debug for OAuthClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientCredentials")
            .field("token_url", &self.endpoint.url.as_str())
            .field("client_id", &self.endpoint.client_id)
            .field("audience", &self.endpoint.audience)
            .finish_non_exhaustive()
    }
}
