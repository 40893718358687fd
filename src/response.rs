//! Call outcomes.
//!
//! A [`Response`] describes how a logical call ended: the last status code
//! received (if any), the raw body, the error that ended the call (if any) and
//! how many physical attempts were made. A [`TypedResponse`] adds the decoded
//! value on top.
//!
//! Calls never return `Err`: every failure is captured on the response and
//! reported through [`Response::success`]. Use [`Response::ensure_success`] or
//! [`TypedResponse::into_value`] to turn a failed call into an [`Error`].

use crate::{Error, Result};
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// The outcome of a logical call.
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
/// let response = client.get::<serde_json::Value>("/users/123").await;
///
/// if response.is_not_found() {
///     println!("No such user");
/// } else if !response.success() {
///     eprintln!("Call failed after {} attempts: {:?}", response.attempts, response.error);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response {
    /// The status code of the last attempt.
    ///
    /// `None` when no attempt got a status back, e.g. on connection failure.
    pub status: Option<StatusCode>,

    /// The body of the last attempt, if one was received.
    pub raw_body: Option<String>,

    /// The headers of the last attempt.
    pub headers: HeaderMap,

    /// The error that ended the call.
    ///
    /// Set for transport and authentication failures, and for decoding
    /// failures after a successful exchange. A plain non-2xx status leaves
    /// this empty.
    pub error: Option<Error>,

    /// The number of physical attempts made, at least 1.
    pub attempts: usize,

    /// Time from the start of the first attempt until the call ended.
    pub latency: Duration,
}

impl Response {
    /// Creates a response for a received status.
    pub fn from_status(
        status: StatusCode,
        raw_body: String,
        headers: HeaderMap,
        attempts: usize,
        latency: Duration,
    ) -> Self {
        Self {
            status: Some(status),
            raw_body: Some(raw_body),
            headers,
            error: None,
            attempts: attempts.max(1),
            latency,
        }
    }

    /// Creates a response for a call that ended with `error`.
    pub fn from_error(error: Error, attempts: usize, latency: Duration) -> Self {
        Self {
            status: None,
            raw_body: None,
            headers: HeaderMap::new(),
            error: Some(error),
            attempts: attempts.max(1),
            latency,
        }
    }

    /// Returns `true` if the status is 2xx and no error was recorded.
    pub fn success(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| s.is_success())
    }

    /// Returns `true` for 4xx statuses above 400, except 401.
    ///
    /// `400 Bad Request` and `401 Unauthorized` are deliberately excluded.
    pub fn is_client_error(&self) -> bool {
        self.status
            .map(|s| s.as_u16())
            .is_some_and(|s| s > 400 && s < 500 && s != 401)
    }

    /// Returns `true` if the status is `403 Forbidden`.
    pub fn is_forbidden(&self) -> bool {
        self.status == Some(StatusCode::FORBIDDEN)
    }

    /// Returns `true` if the status is `404 Not Found`.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(StatusCode::NOT_FOUND)
    }

    /// Returns `true` if the call took more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the response if it succeeded, or the error describing the failure.
    ///
    /// A recorded error is returned as-is. A non-2xx status becomes
    /// [`Error::HttpError`], whose message carries the status code, its reason
    /// phrase and the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use http::{HeaderMap, StatusCode};
    /// use rebound::{Error, Response};
    /// use std::time::Duration;
    ///
    /// let response = Response::from_status(
    ///     StatusCode::FORBIDDEN,
    ///     r#"{"reason":"nope"}"#.to_string(),
    ///     HeaderMap::new(),
    ///     1,
    ///     Duration::ZERO,
    /// );
    ///
    /// let err = response.ensure_success().unwrap_err();
    /// assert!(matches!(err, Error::HttpError { status, .. } if status == StatusCode::FORBIDDEN));
    /// assert!(err.to_string().starts_with("HTTP error 403 Forbidden"));
    /// ```
    pub fn ensure_success(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(self.into_error())
    }

    pub(crate) fn into_error(self) -> Error {
        if let Some(error) = self.error {
            return error;
        }
        match self.status {
            Some(status) => Error::HttpError {
                status,
                raw_response: render_body(self.raw_body.as_deref().unwrap_or_default()),
            },
            None => Error::EmptyResponse,
        }
    }
}

/// Pretty-prints a JSON body for error messages, falling back to the raw text.
fn render_body(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    match serde_json::from_str::<serde_json::Value>(raw)
        .and_then(|json| serde_json::to_string_pretty(&json))
    {
        Ok(pretty) => pretty,
        Err(e) => {
            tracing::debug!(error = %e, "Error body is not JSON, using it verbatim");
            raw.to_string()
        }
    }
}

/// A [`Response`] together with its decoded value.
///
/// `value` is present exactly when the call succeeded and the body decoded.
/// A decoding failure is recorded as the response's error, so
/// [`success`](Response::success) turns `false` even though the exchange
/// itself returned 2xx.
///
/// Dereferences to [`Response`] for the status predicates.
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
/// let response = client.get::<User>("/users/123").await;
/// println!("Took {} attempt(s)", response.attempts);
///
/// let user = response.into_value()?;
/// println!("User: {}", user.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TypedResponse<T> {
    /// The underlying call outcome.
    pub response: Response,

    /// The decoded value, present only on success.
    pub value: Option<T>,
}

impl<T> TypedResponse<T> {
    /// Wraps a response that has no value.
    pub fn without_value(response: Response) -> Self {
        Self {
            response,
            value: None,
        }
    }

    /// Returns the decoded value, if any.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Returns the decoded value, or the error describing why there is none.
    pub fn into_value(self) -> Result<T> {
        match self.value {
            Some(value) if self.response.success() => Ok(value),
            _ => Err(self.response.into_error()),
        }
    }

    /// Maps the decoded value while keeping the response details.
    ///
    /// # Examples
    ///
    /// ```
    /// # use rebound::{Response, TypedResponse};
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::from_status(
    ///     StatusCode::OK,
    ///     "42".to_string(),
    ///     HeaderMap::new(),
    ///     1,
    ///     Duration::from_millis(100),
    /// );
    /// let typed = TypedResponse { response, value: Some(42) };
    ///
    /// let string_response = typed.map(|n| n.to_string());
    /// assert_eq!(string_response.value(), Some(&"42".to_string()));
    /// ```
    pub fn map<U, F>(self, f: F) -> TypedResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        TypedResponse {
            response: self.response,
            value: self.value.map(f),
        }
    }
}

impl<T> std::ops::Deref for TypedResponse<T> {
    type Target = Response;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}
