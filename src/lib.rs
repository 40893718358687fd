//! # Rebound - resilient calls to REST endpoints
//!
//! Rebound sits between your code and a remote REST API. Each logical call is
//! driven through one or more physical attempts: credentials are injected by a
//! pluggable authentication strategy, transient failures are retried with a
//! configurable backoff, an expired credential is refreshed once on
//! `401 Unauthorized`, and the final outcome is normalized into a typed,
//! inspectable result.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rebound::{Client, RetryStrategy};
//! use rebound::auth::DelegatedAuth;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rebound::Error> {
//!     let auth = DelegatedAuth::new(|| async { std::env::var("API_TOKEN") });
//!
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(5))
//!         .max_attempts(4)
//!         .retry_delay(Duration::from_millis(250))
//!         .retry_strategy(RetryStrategy::Exponential)
//!         .auth_strategy(Arc::new(auth))
//!         .build()?;
//!
//!     // Calls never fail outright: inspect the response...
//!     let response = client.get::<User>("/users/123").await;
//!     if response.is_not_found() {
//!         println!("No such user");
//!     }
//!
//!     // ...or unwrap it into the value or an error.
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created = client.post::<_, User>("/users", &new_user).await.into_value()?;
//!     println!("Created user {} ({})", created.id, created.name);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded retries** - 5xx responses are retried up to `max_attempts` with
//!   constant, linear or exponential delays; redirects and client errors are not
//! - **Authentication strategies** - HTTP Basic, delegated bearer tokens and the
//!   OAuth 2.0 client-credentials grant, with coalesced token fetches
//! - **Automatic re-authentication** - a `401` on the first attempt refreshes the
//!   credential and retries once with the new one
//! - **Uniform failure reporting** - transport, status, auth and decoding failures
//!   all end up on the same [`Response`]
//! - **JSON processors** - transform request and response bodies leaf by leaf,
//!   e.g. normalizing ISO-8601 timestamps with [`processor::IsoDateProcessor`]
//! - **Structured logging** with `tracing`

pub mod auth;
mod client;
mod config;
mod error;
pub mod metadata;
pub mod processor;
mod response;
pub mod retry;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{AuthError, Error, Result};
pub use response::{Response, TypedResponse};
pub use retry::RetryStrategy;
