//! Error types for orchestrated API calls.
//!
//! Every failure a logical call can end in is represented by [`Error`]. The
//! client never returns these directly from `invoke`/`call`; they are captured
//! on the [`Response`](crate::Response) and only surface through the
//! unwrapping accessors such as [`Response::ensure_success`](crate::Response::ensure_success).

use http::StatusCode;

/// The main error type for API calls.
///
/// The variants follow the four failure families a call can hit: transport
/// failures (no status obtained), HTTP status failures, authentication
/// failures and decoding failures. A few local variants cover invalid
/// configuration and request serialization.
///
/// # Examples
///
/// ```no_run
/// use rebound::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint").await.into_value() {
///     Ok(value) => println!("Success: {:?}", value),
///     Err(Error::DeserializationFailed { raw_response, message, .. }) => {
///         eprintln!("Failed to decode. Raw response: {}", raw_response);
///         eprintln!("Decoder error: {}", message);
///     }
///     Err(Error::HttpError { status, raw_response }) => {
///         eprintln!("HTTP error {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection refused, DNS lookup failed, etc.).
    ///
    /// No status code was obtained for the attempt.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The attempt exceeded its per-attempt timeout.
    #[error("Request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    ///
    /// Produced when a failed [`Response`](crate::Response) is unwrapped. The
    /// `Display` form carries the status code, its canonical reason phrase and
    /// the response body.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The response body, pretty-printed when it was valid JSON
        raw_response: String,
    },

    /// Acquiring or refreshing credentials failed.
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The transport call succeeded but the body could not be turned into the
    /// expected type.
    ///
    /// # Fields
    ///
    /// * `status` - The HTTP status code of the (successful) response
    /// * `raw_response` - The raw response body
    /// * `message` - The error message reported by the decoder
    #[error("Failed to decode response (status {status}): {message}")]
    DeserializationFailed {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body that failed to decode
        raw_response: String,
        /// The decoder's error message
        message: String,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid configuration was provided, such as an invalid header value.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A response carried neither a status code nor an error.
    ///
    /// Only a misbehaving [`Transport`](crate::transport::Transport) can
    /// produce this.
    #[error("Response carries neither a status code nor an error")]
    EmptyResponse,
}

impl Error {
    /// Returns `true` if no status code was obtained for the attempt.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout)
    }

    /// Returns `true` if the client backs off and retries after this error.
    ///
    /// Statuses follow the client's retry rules: 3xx and 4xx end the call,
    /// except `401 Unauthorized`, which is retried after a credential refresh
    /// or a backoff. Transport failures are retryable only when
    /// [`ClientBuilder::retry_network_errors`](crate::ClientBuilder::retry_network_errors)
    /// is enabled, so they report `false` here; check [`Error::is_transport`]
    /// for them.
    ///
    /// # Examples
    ///
    /// ```
    /// use rebound::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::HttpError {
    ///     status: StatusCode::BAD_GATEWAY,
    ///     raw_response: "upstream down".to_string(),
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::HttpError {
    ///     status: StatusCode::NOT_FOUND,
    ///     raw_response: String::new(),
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::HttpError { status, .. } => is_retryable_status(*status),
            Error::Network(_)
            | Error::Timeout
            | Error::Auth(_)
            | Error::DeserializationFailed { .. }
            | Error::SerializationFailed(_)
            | Error::ConfigurationError(_)
            | Error::InvalidUrl(_)
            | Error::EmptyResponse => false,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Auth(AuthError::TokenEndpoint { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// Failure to acquire or refresh a credential.
///
/// Cloneable so a single token fetch can report the same outcome to every
/// caller waiting on it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A caller-supplied token fetch function failed.
    #[error("token fetch failed: {0}")]
    Fetch(String),

    /// The OAuth token endpoint answered with a non-2xx status.
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint {
        /// Status returned by the token endpoint
        status: StatusCode,
        /// Body returned by the token endpoint
        body: String,
    },

    /// The token endpoint answered 2xx but without an `access_token` string.
    #[error("token response is missing `access_token`")]
    MissingAccessToken,

    /// The credential cannot be encoded as an HTTP header value.
    #[error("invalid authorization header: {0}")]
    InvalidHeader(String),
}

/// Non-2xx statuses the client backs off on: anything outside 3xx and 4xx,
/// plus `401 Unauthorized`.
pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    if status.is_success() {
        return false;
    }
    status == StatusCode::UNAUTHORIZED
        || !(status.is_redirection() || status.is_client_error())
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_have_no_status() {
        assert!(Error::Timeout.is_transport());
        assert_eq!(Error::Timeout.status(), None);
        assert!(!Error::EmptyResponse.is_transport());
    }

    #[test]
    fn test_auth_errors_are_not_retryable() {
        let err = Error::from(AuthError::MissingAccessToken);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Authentication failed: token response is missing `access_token`"
        );
    }

    #[test]
    fn test_retryable_statuses_match_client_rules() {
        let retryable = |code: u16| {
            Error::HttpError {
                status: StatusCode::from_u16(code).unwrap(),
                raw_response: String::new(),
            }
            .is_retryable()
        };
        assert!(retryable(500));
        assert!(retryable(503));
        assert!(retryable(401));
        assert!(!retryable(200));
        assert!(!retryable(302));
        assert!(!retryable(400));
        assert!(!retryable(404));
        assert!(!retryable(429));
    }

    #[test]
    fn test_transport_errors_are_not_retryable_by_default() {
        assert!(!Error::Timeout.is_retryable());
        assert!(Error::Timeout.is_transport());
    }

    #[test]
    fn test_token_endpoint_error_exposes_status() {
        let err = Error::from(AuthError::TokenEndpoint {
            status: StatusCode::UNAUTHORIZED,
            body: "bad client".to_string(),
        });
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_http_error_display_includes_reason_phrase() {
        let err = Error::HttpError {
            status: StatusCode::NOT_FOUND,
            raw_response: "{}".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 404 Not Found: {}");
    }
}
