//! Example demonstrating the request logger, error inspection and cancellation.
//!
//! This example shows how to:
//! - Log every request and response with `NetworkLogger`
//! - Inspect the status and raw body of a rejected response
//! - Cancel an in-flight request
//!
//! Run with: `cargo run --example logging_and_cancellation`

use courier::{NetworkError, NetworkLogger, NetworkService, Route};
use http::Method;

const BASE_URL: &str = "https://jsonplaceholder.typicode.com";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=info")
        .init();

    let service = NetworkService::builder().build()?;
    let logger = NetworkLogger::new(&service).include_headers(true);
    logger.start();

    println!("=== Example 1: Handling Rejected Responses ===");
    let route = Route::parse(Method::GET, BASE_URL, "posts/999999")?;
    match service.request_json_object(route).await {
        Ok(response) => println!("Success: {:?}", response.value),
        Err(e @ NetworkError::Validation { .. }) => {
            println!("Rejected: {}", e);
            if let Some(status) = e.status_code() {
                println!("  Status: {:?}", status);
                println!("  Is client error (4xx): {}", status.is_client_error());
                println!("  Failure reason: {}", status.failure_reason());
                println!("  Suggestion: {}", status.recovery_suggestion());
            }
            if let Some(body) = e.raw_body() {
                println!("  Raw response: {}", String::from_utf8_lossy(body));
            }
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Unexpected JSON Shape ===");
    let route = Route::parse(Method::GET, BASE_URL, "posts")?;
    match service.request_json_object(route).await {
        Ok(_) => println!("Unexpectedly received an object"),
        Err(e) => println!("Error: {}", e),
    }
    println!();

    println!("=== Example 3: Cancellation ===");
    let route = Route::parse(Method::GET, BASE_URL, "photos")?;
    let task = service.request_data(route);
    task.cancel();
    match task.await {
        Err(e) if e.is_cancelled() => println!("Request cancelled"),
        Ok(response) => println!("Finished before cancel: {} bytes", response.value.len()),
        Err(e) => println!("Other error: {}", e),
    }

    logger.stop();
    Ok(())
}
