//! Calling an API protected by the OAuth 2.0 client-credentials grant.
//!
//! The token is fetched lazily on the first call and reused afterwards. If
//! the API answers 401 the token is refreshed once and the call retried.
//!
//! Run with:
//! `TOKEN_URL=... CLIENT_ID=... CLIENT_SECRET=... API_URL=... cargo run --example oauth_client`

use rebound::auth::OAuthClientCredentials;
use rebound::{Client, Error};
use std::sync::Arc;

fn env(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| Error::ConfigurationError(format!("{} is not set", name)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("rebound=debug,oauth_client=info")
        .init();

    let mut auth = OAuthClientCredentials::new(env("TOKEN_URL")?, env("CLIENT_ID")?, env("CLIENT_SECRET")?)?;
    if let Ok(audience) = std::env::var("AUDIENCE") {
        auth = auth.audience(audience);
    }

    let client = Client::builder()
        .base_url(env("API_URL")?)?
        .auth_strategy(Arc::new(auth))
        .build()?;

    let response = client.get::<serde_json::Value>("/").await;
    println!("Status: {:?} after {} attempt(s)", response.status, response.attempts);

    match response.into_value() {
        Ok(body) => println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default()),
        Err(e) => eprintln!("Call failed: {}", e),
    }

    Ok(())
}
