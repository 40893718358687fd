//! Basic example demonstrating GET and POST calls with retries.
//!
//! This example shows how to:
//! - Create a client with a retry budget and backoff strategy
//! - Inspect a call outcome without unwrapping it
//! - Unwrap a call into its value or an error
//! - Normalize timestamps with the ISO date processor
//!
//! Run with: `cargo run --example basic_call`

use rebound::processor::IsoDateProcessor;
use rebound::{Client, Error, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("rebound=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .timeout(Duration::from_secs(5))
        .max_attempts(3)
        .retry_delay(Duration::from_millis(200))
        .retry_strategy(RetryStrategy::Exponential)
        .inbound_processor(Arc::new(IsoDateProcessor))
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.get::<Post>("/posts/1").await;
    println!("Status: {:?}", response.status);
    println!("Attempts: {}", response.attempts);
    println!("Latency: {:?}", response.latency);

    let post = response.into_value()?;
    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let response = client.post::<_, Post>("/posts", &new_post).await;
    println!("Was retried: {}", response.was_retried());
    println!("Content-Type: {:?}", response.header("content-type"));
    let created = response.into_value()?;
    println!("Created post ID: {}", created.id);
    println!();

    println!("=== Failure Example ===");
    let missing = client.get::<Post>("/posts/does-not-exist").await;
    if missing.is_not_found() {
        println!("Not found after {} attempt(s), as expected", missing.attempts);
    } else if let Err(e) = missing.into_value() {
        println!("Call failed: {}", e);
    }

    Ok(())
}
