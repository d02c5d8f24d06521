//! Basic example demonstrating typed GET and POST requests.
//!
//! This example shows how to:
//! - Create a service with basic configuration
//! - Decode JSON objects and arrays into models
//! - Send a JSON body
//! - Access response metadata
//!
//! Run with: `cargo run --example basic_request`

use courier::{NetworkError, NetworkService, Route};
use http::Method;
use serde::Deserialize;
use serde_json::json;

const BASE_URL: &str = "https://jsonplaceholder.typicode.com";

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), NetworkError> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug,basic_request=info")
        .init();

    let service = NetworkService::builder()
        .default_header("Accept", "application/json")?
        .build()?;

    println!("=== GET Request Example ===");
    let route = Route::parse(Method::GET, BASE_URL, "posts/1")?;
    let response = service.request_decoded::<Post>(route).await?;

    println!("Post ID: {}", response.id);
    println!("Title: {}", response.title);
    println!("Request latency: {:?}", response.response.latency);
    println!("Status code: {:?}", response.status_code());
    println!();

    println!("=== GET Array Example ===");
    let route = Route::parse(Method::GET, BASE_URL, "posts")?;
    let posts = service.request_decoded_array::<Post>(route).value().await?;
    println!("Fetched {} posts", posts.len());
    println!();

    println!("=== POST Request Example ===");
    let route = Route::parse(Method::POST, BASE_URL, "posts")?.with_json(json!({
        "title": "My New Post",
        "body": "This is the content of my new post!",
        "userId": 1
    }));
    let response = service.request_decoded::<Post>(route).await?;

    println!("Created post ID: {}", response.id);
    println!("Raw response length: {} bytes", response.response.body.len());
    println!("Content-Type: {:?}", response.header("content-type"));

    Ok(())
}
