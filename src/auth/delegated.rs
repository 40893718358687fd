//! Bearer tokens produced by a caller-supplied function.

use super::{authorization_header, AuthStrategy, TokenCache, TokenFuture};
use crate::error::AuthError;
use async_trait::async_trait;
use futures::FutureExt;
use http::HeaderMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Sends a bearer token obtained from an async function you provide.
///
/// The token is fetched on first use and cached. Concurrent callers that find
/// no cached token share a single call to the fetch function. A failed fetch
/// is not cached: the next request calls the function again.
///
/// # Examples
///
/// ```no_run
/// use rebound::auth::DelegatedAuth;
/// use rebound::Client;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), rebound::Error> {
/// let auth = DelegatedAuth::new(|| async {
///     // Ask a vault, a sidecar, the environment...
///     std::env::var("API_TOKEN")
/// });
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .auth_strategy(Arc::new(auth))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DelegatedAuth {
    fetch: Arc<dyn Fn() -> TokenFuture + Send + Sync>,
    cache: TokenCache,
}

impl DelegatedAuth {
    /// Creates a strategy around `fetch`.
    ///
    /// The error type only needs to be displayable; it is reported as
    /// [`AuthError::Fetch`].
    pub fn new<F, Fut, E>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let fetch = move || -> TokenFuture {
            let pending = fetch();
            async move { pending.await.map_err(|e| AuthError::Fetch(e.to_string())) }.boxed()
        };
        Self {
            fetch: Arc::new(fetch),
            cache: TokenCache::default(),
        }
    }

    fn start_fetch(&self) -> TokenFuture {
        tracing::debug!("Fetching bearer token from delegate");
        (self.fetch)()
    }
}

#[async_trait]
impl AuthStrategy for DelegatedAuth {
    async fn auth_headers(&self) -> Result<HeaderMap, AuthError> {
        let token = self.cache.get_or_fetch(|| self.start_fetch()).await?;
        authorization_header(&format!("Bearer {}", token))
    }

    async fn refresh_token(&self) -> Result<(), AuthError> {
        match self.cache.refresh(|| self.start_fetch()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Bearer token refresh failed");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for DelegatedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedAuth").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::AUTHORIZATION;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_auth(calls: Arc<AtomicUsize>) -> DelegatedAuth {
        DelegatedAuth::new(move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, String>(format!("token-{}", n))
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let auth = counting_auth(Arc::clone(&calls));

        let results = futures::future::join_all((0..10).map(|_| auth.auth_headers())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for headers in results {
            assert_eq!(headers.unwrap()[AUTHORIZATION], "Bearer token-1");
        }
    }

    #[tokio::test]
    async fn test_refresh_fetches_a_new_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let auth = counting_auth(Arc::clone(&calls));

        auth.auth_headers().await.unwrap();
        auth.refresh_token().await.unwrap();
        let headers = auth.auth_headers().await.unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_on_next_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let auth = DelegatedAuth::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err("vault unavailable")
                } else {
                    Ok("fresh".to_string())
                }
            }
        });

        let err = auth.auth_headers().await.unwrap_err();
        assert_eq!(err, AuthError::Fetch("vault unavailable".to_string()));

        let headers = auth.auth_headers().await.unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
