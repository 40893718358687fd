//! HTTP client with retries, authentication and typed results.
//!
//! The [`Client`] type is the main entry point for making calls.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    auth::AuthStrategy,
    config::ClientConfig,
    error::is_retryable_status,
    metadata::RequestMetadata,
    processor::{apply_processors, JsonProcessor},
    transport::{ReqwestTransport, Transport, TransportRequest},
    Error, Response, Result, RetryStrategy, TypedResponse,
};
use http::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client that retries transient failures, authenticates requests
/// and decodes responses.
///
/// The client is immutable and cheap to clone. To change its configuration,
/// derive a new client with [`Client::to_builder`].
///
/// # Retry behavior
///
/// Every logical call makes between 1 and `max_attempts` physical attempts:
///
/// - a 2xx status ends the call;
/// - 3xx and 4xx statuses other than 401 end the call;
/// - a 401 on the first attempt makes the auth strategy refresh its
///   credential, then the call is retried immediately;
/// - any other status (5xx, or a repeated 401) is retried after the delay
///   computed by the [`RetryStrategy`];
/// - transport failures end the call unless
///   [`ClientBuilder::retry_network_errors`] is enabled;
/// - failing to obtain or refresh a credential ends the call.
///
/// # Examples
///
/// ```no_run
/// use rebound::{Client, RetryStrategy};
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), rebound::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .max_attempts(4)
///     .retry_strategy(RetryStrategy::Linear)
///     .build()?;
///
/// let user = client.get::<User>("/users/123").await.into_value()?;
/// println!("User: {}", user.name);
///
/// let new_user = CreateUser { name: "Alice".to_string() };
/// let created = client.post::<_, User>("/users", &new_user).await;
/// if created.success() {
///     println!("Created user after {} attempt(s)", created.attempts);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    default_headers: HeaderMap,
    config: ClientConfig,
    auth_strategy: Option<Arc<dyn AuthStrategy>>,
    outbound: Vec<Arc<dyn JsonProcessor>>,
    inbound: Vec<Arc<dyn JsonProcessor>>,
}

/// What to do after an attempt.
enum Next {
    Finish,
    Refresh,
    Backoff,
}

/// Ends a call whose next attempt failed before anything was sent.
///
/// The error is attached to the previous attempt's response, if any, so the
/// status and attempt count stay those of the last physical request.
fn fail_before_send(previous: Option<Response>, error: Error, latency: Duration) -> Response {
    match previous {
        Some(mut response) => {
            response.error = Some(error);
            response.latency = latency;
            response
        }
        None => Response::from_error(error, 1, latency),
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Returns a builder seeded with this client's configuration.
    ///
    /// Building it produces a new client; this one is left untouched.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rebound::Client;
    ///
    /// # async fn example() -> Result<(), rebound::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let tenant_client = client
    ///     .to_builder()
    ///     .default_header("X-Tenant", "acme")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn to_builder(&self) -> ClientBuilder {
        let inner = self.inner.as_ref().clone();
        ClientBuilder {
            base_url: Some(inner.base_url),
            default_headers: inner.default_headers,
            config: inner.config,
            auth_strategy: inner.auth_strategy,
            outbound: inner.outbound,
            inbound: inner.inbound,
            transport: Some(inner.transport),
        }
    }

    /// Returns a new client that also sends the given default header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_default_header(
        &self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Client> {
        self.to_builder().default_header(name, value)?.build()
    }

    /// Makes an untyped call and returns its outcome.
    ///
    /// This is the retry loop every other method is built on. `body` is run
    /// through the outbound processors before each attempt and sent as JSON.
    /// The call never fails; inspect [`Response::success`] or use
    /// [`Response::ensure_success`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rebound::{Client, metadata::RequestMetadata};
    /// use http::Method;
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), rebound::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let metadata = RequestMetadata::new(Method::POST, "/search").with_max_attempts(1);
    /// let response = client.invoke(metadata, Some(json!({"query": "rust"}))).await;
    /// println!("status: {:?}", response.status);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn invoke(&self, metadata: RequestMetadata, body: Option<Value>) -> Response {
        let config = &self.inner.config;
        let max_attempts = metadata.max_attempts.unwrap_or(config.max_attempts).max(1);
        let timeout = metadata.timeout.unwrap_or(config.timeout);
        let start_time = Instant::now();

        let url = self.build_url(&metadata);

        let mut attempt = 1;
        // The last physical attempt, kept so a failure before the next send
        // reports what was actually sent.
        let mut previous: Option<Response> = None;
        loop {
            let mut headers = match self.build_headers(&metadata).await {
                Ok(headers) => headers,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        method = %metadata.method,
                        path = %metadata.path,
                        "Failed to obtain auth headers"
                    );
                    return fail_before_send(previous, e, start_time.elapsed());
                }
            };

            let encoded = match self.encode_body(body.as_ref()) {
                Ok(encoded) => encoded,
                Err(e) => return fail_before_send(previous, e, start_time.elapsed()),
            };
            if encoded.is_some() {
                headers
                    .entry(CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
            }

            let request = TransportRequest {
                method: metadata.method.clone(),
                url: url.clone(),
                headers,
                body: encoded,
                timeout,
            };

            tracing::debug!(
                method = %metadata.method,
                url = %url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let (status, response) = match self.inner.transport.send(request).await {
                Ok(received) => {
                    let status = received.status;
                    tracing::info!(
                        status = status.as_u16(),
                        latency_ms = start_time.elapsed().as_millis(),
                        attempt = attempt,
                        "Received HTTP response"
                    );
                    let response = Response::from_status(
                        status,
                        received.body,
                        received.headers,
                        attempt,
                        start_time.elapsed(),
                    );
                    (Some(status), response)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        method = %metadata.method,
                        path = %metadata.path,
                        "Request failed"
                    );
                    (None, Response::from_error(e, attempt, start_time.elapsed()))
                }
            };

            match self.next_step(status, attempt, max_attempts) {
                Next::Finish => return response,
                Next::Refresh => {
                    // Only reachable with an auth strategy configured.
                    if let Some(auth) = &self.inner.auth_strategy {
                        tracing::info!(attempt = attempt, "Unauthorized, refreshing credentials");
                        if let Err(e) = auth.refresh_token().await {
                            tracing::warn!(error = %e, "Credential refresh failed");
                            let mut response = response;
                            response.error = Some(Error::Auth(e));
                            response.latency = start_time.elapsed();
                            return response;
                        }
                    }
                }
                Next::Backoff => {
                    let delay = config
                        .retry_strategy
                        .delay_for_attempt(attempt, config.retry_delay);
                    if let Some(status) = status {
                        if status.is_server_error() {
                            tracing::warn!(
                                status = status.as_u16(),
                                response = response.raw_body.as_deref().unwrap_or_default(),
                                "Server error (5xx)"
                            );
                        }
                    }
                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        "Retrying request after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            previous = Some(response);
            attempt += 1;
        }
    }

    /// Classifies the outcome of an attempt.
    fn next_step(&self, status: Option<StatusCode>, attempt: usize, max_attempts: usize) -> Next {
        let Some(status) = status else {
            return if self.inner.config.retry_network_errors && attempt < max_attempts {
                Next::Backoff
            } else {
                Next::Finish
            };
        };

        if status.is_success() || attempt >= max_attempts {
            Next::Finish
        } else if status == StatusCode::UNAUTHORIZED
            && attempt == 1
            && self.inner.auth_strategy.is_some()
        {
            Next::Refresh
        } else if is_retryable_status(status) {
            Next::Backoff
        } else {
            Next::Finish
        }
    }

    /// Makes a call and decodes the body with `decode`.
    ///
    /// The inbound processors run over the parsed body before `decode` sees
    /// it. An empty body is passed as `Value::Null`. If the body is not JSON
    /// or `decode` fails, the failure is recorded on the response and
    /// [`Response::success`] becomes `false`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rebound::{Client, metadata::RequestMetadata};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), rebound::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let metadata = RequestMetadata::new(Method::GET, "/count");
    /// let count = client
    ///     .call_with(metadata, None, |json| {
    ///         json["count"].as_u64().ok_or("missing count")
    ///     })
    ///     .await
    ///     .into_value()?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call_with<T, F, E>(
        &self,
        metadata: RequestMetadata,
        body: Option<Value>,
        decode: F,
    ) -> TypedResponse<T>
    where
        F: FnOnce(Value) -> std::result::Result<T, E>,
        E: fmt::Display,
    {
        let mut response = self.invoke(metadata, body).await;
        if !response.success() {
            return TypedResponse::without_value(response);
        }

        let status = response.status.unwrap_or(StatusCode::OK);
        let raw_body = response.raw_body.clone().unwrap_or_default();

        let parsed = if raw_body.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&raw_body).map_err(|e| e.to_string())
        };

        let decoded = parsed.and_then(|json| {
            let json = apply_processors(json, &self.inner.inbound);
            decode(json).map_err(|e| e.to_string())
        });

        match decoded {
            Ok(value) => TypedResponse {
                response,
                value: Some(value),
            },
            Err(message) => {
                tracing::error!(
                    error = %message,
                    raw_response = %raw_body,
                    "Failed to decode response"
                );
                response.error = Some(Error::DeserializationFailed {
                    status,
                    raw_response: raw_body,
                    message,
                });
                TypedResponse::without_value(response)
            }
        }
    }

    /// Makes a typed call.
    ///
    /// Serializes `body` to JSON, runs the retry loop and deserializes the
    /// successful body into `Res`.
    ///
    /// # Type Parameters
    ///
    /// * `Req` - The request body type (must implement `Serialize`)
    /// * `Res` - The response body type (must implement `DeserializeOwned`)
    pub async fn call<Req, Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> TypedResponse<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let body = match body.map(serde_json::to_value).transpose() {
            Ok(body) => body,
            Err(e) => {
                let error = Error::SerializationFailed(e.to_string());
                return TypedResponse::without_value(Response::from_error(
                    error,
                    1,
                    Duration::ZERO,
                ));
            }
        };

        self.call_with(metadata, body, serde_json::from_value::<Res>)
            .await
    }

    /// Makes a GET request to the specified path.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rebound::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), rebound::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user = client.get::<User>("/users/123").await;
    /// if let Some(user) = user.value() {
    ///     println!("User: {}", user.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, path: impl Into<String>) -> TypedResponse<Res>
    where
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::GET, path);
        self.call::<(), Res>(metadata, None).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> TypedResponse<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::POST, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> TypedResponse<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PUT, path);
        self.call(metadata, Some(body)).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> TypedResponse<Res>
    where
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::DELETE, path);
        self.call::<(), Res>(metadata, None).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(&self, path: impl Into<String>, body: &Req) -> TypedResponse<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let metadata = RequestMetadata::new(Method::PATCH, path);
        self.call(metadata, Some(body)).await
    }

    fn build_url(&self, metadata: &RequestMetadata) -> Url {
        let mut url = self.inner.base_url.clone();
        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            metadata.path.trim_start_matches('/')
        );
        url.set_path(&path);

        if !metadata.query_params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &metadata.query_params {
                query.append_pair(key, value);
            }
        }

        url
    }

    /// Merges default, per-request and auth headers, in increasing precedence.
    async fn build_headers(&self, metadata: &RequestMetadata) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (name, value) in &self.inner.default_headers {
            headers.insert(name, value.clone());
        }
        for (name, value) in &metadata.headers {
            headers.insert(name, value.clone());
        }

        if let Some(auth) = &self.inner.auth_strategy {
            let auth_headers = auth.auth_headers().await?;
            for (name, value) in &auth_headers {
                headers.insert(name, value.clone());
            }
        }

        Ok(headers)
    }

    /// Runs the outbound processors over the body and encodes it.
    fn encode_body(&self, body: Option<&Value>) -> Result<Option<String>> {
        match body {
            None | Some(Value::Null) => Ok(None),
            Some(body) => {
                let processed = apply_processors(body.clone(), &self.inner.outbound);
                serde_json::to_string(&processed)
                    .map(Some)
                    .map_err(|e| Error::SerializationFailed(e.to_string()))
            }
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("config", &self.inner.config)
            .field("authenticated", &self.inner.auth_strategy.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use rebound::{ClientBuilder, RetryStrategy};
/// use rebound::auth::BasicAuth;
/// use rebound::processor::IsoDateProcessor;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), rebound::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(5))
///     .max_attempts(5)
///     .retry_delay(Duration::from_millis(200))
///     .retry_strategy(RetryStrategy::Exponential)
///     .auth_strategy(Arc::new(BasicAuth::new("user", "password")?))
///     .inbound_processor(Arc::new(IsoDateProcessor))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    config: ClientConfig,
    auth_strategy: Option<Arc<dyn AuthStrategy>>,
    outbound: Vec<Arc<dyn JsonProcessor>>,
    inbound: Vec<Arc<dyn JsonProcessor>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            config: ClientConfig::default(),
            auth_strategy: None,
            outbound: Vec::new(),
            inbound: Vec::new(),
            transport: None,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the whole retry and timeout configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the maximum number of physical attempts per call.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay handed to the retry strategy.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Sets the retry delay strategy.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.retry_strategy = strategy;
        self
    }

    /// Sets whether transport failures are retried with backoff.
    ///
    /// Disabled by default.
    pub fn retry_network_errors(mut self, enabled: bool) -> Self {
        self.config.retry_network_errors = enabled;
        self
    }

    /// Sets the authentication strategy.
    pub fn auth_strategy(mut self, strategy: Arc<dyn AuthStrategy>) -> Self {
        self.auth_strategy = Some(strategy);
        self
    }

    /// Appends a processor to the outbound (request body) chain.
    pub fn outbound_processor(mut self, processor: Arc<dyn JsonProcessor>) -> Self {
        self.outbound.push(processor);
        self
    }

    /// Appends a processor to the inbound (response body) chain.
    pub fn inbound_processor(mut self, processor: Arc<dyn JsonProcessor>) -> Self {
        self.inbound.push(processor);
        self
    }

    /// Sends requests through `transport` instead of the default `reqwest` one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default
    /// transport cannot be built.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                config: self.config.normalized(),
                auth_strategy: self.auth_strategy,
                outbound: self.outbound,
                inbound: self.inbound,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
