//! Authentication strategies.
//!
//! An [`AuthStrategy`] contributes headers to every attempt and can be told to
//! refresh its credential. The client asks for a refresh once per logical call,
//! when the first attempt comes back `401 Unauthorized`.
//!
//! Three strategies are provided:
//!
//! - [`BasicAuth`] - a static `user:password` pair sent as HTTP Basic auth
//! - [`DelegatedAuth`] - a bearer token produced by a caller-supplied async function
//! - [`OAuthClientCredentials`] - a bearer token obtained with the OAuth 2.0
//!   client-credentials grant

mod basic;
mod delegated;
mod oauth;

pub use basic::BasicAuth;
pub use delegated::DelegatedAuth;
pub use oauth::OAuthClientCredentials;

use crate::error::AuthError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Supplies authentication headers and refreshes the underlying credential.
///
/// Implementations are shared between concurrent calls and must make sure
/// that at most one credential fetch is in flight at a time.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use http::{HeaderMap, HeaderValue};
/// use rebound::auth::AuthStrategy;
/// use rebound::AuthError;
///
/// struct ApiKey(HeaderValue);
///
/// #[async_trait]
/// impl AuthStrategy for ApiKey {
///     async fn auth_headers(&self) -> Result<HeaderMap, AuthError> {
///         let mut headers = HeaderMap::new();
///         headers.insert("x-api-key", self.0.clone());
///         Ok(headers)
///     }
///
///     async fn refresh_token(&self) -> Result<(), AuthError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Returns the headers to merge into the request.
    ///
    /// May fetch the credential lazily on first use.
    async fn auth_headers(&self) -> Result<HeaderMap, AuthError>;

    /// Forces a new credential fetch, replacing the cached one.
    ///
    /// # Errors
    ///
    /// On failure the cached credential is discarded so the next call fetches
    /// again instead of reusing the failure.
    async fn refresh_token(&self) -> Result<(), AuthError>;
}

pub(crate) type TokenFuture = BoxFuture<'static, Result<String, AuthError>>;

type SharedToken = Shared<TokenFuture>;

/// Holds the one pending or completed token fetch of a strategy.
///
/// Callers arriving while a fetch is in flight await that same fetch.
#[derive(Default)]
pub(crate) struct TokenCache {
    slot: Mutex<Option<SharedToken>>,
}

impl TokenCache {
    /// Returns the cached token, starting a fetch if there is none.
    pub(crate) async fn get_or_fetch<F>(&self, fetch: F) -> Result<String, AuthError>
    where
        F: FnOnce() -> TokenFuture,
    {
        let pending = {
            let mut slot = self.lock();
            slot.get_or_insert_with(|| fetch().shared()).clone()
        };
        self.settle(pending).await
    }

    /// Replaces the cached token with a fresh fetch.
    ///
    /// A fetch that is still in flight is joined rather than duplicated.
    pub(crate) async fn refresh<F>(&self, fetch: F) -> Result<String, AuthError>
    where
        F: FnOnce() -> TokenFuture,
    {
        let pending = {
            let mut slot = self.lock();
            match slot.as_ref() {
                Some(in_flight) if in_flight.peek().is_none() => in_flight.clone(),
                _ => {
                    let fresh = fetch().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };
        self.settle(pending).await
    }

    async fn settle(&self, pending: SharedToken) -> Result<String, AuthError> {
        let outcome = pending.clone().await;
        if outcome.is_err() {
            let mut slot = self.lock();
            // A newer fetch may already have replaced the failed one.
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
                *slot = None;
            }
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Option<SharedToken>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builds a header map holding a single sensitive `Authorization` value.
pub(crate) fn authorization_header(value: &str) -> Result<HeaderMap, AuthError> {
    let mut value =
        HeaderValue::from_str(value).map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
