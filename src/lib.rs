//! # Courier - A thin typed HTTP/JSON request layer
//!
//! Courier sends HTTP requests through `reqwest` and turns the responses into
//! typed values. Every operation returns a cancellable [`Task`] that reports
//! download progress and resolves exactly once with the decoded value and the
//! response it came from, or with a [`NetworkError`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier::{NetworkService, ParameterEncoding, Route};
//! use http::Method;
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), courier::NetworkError> {
//!     let service = NetworkService::builder()
//!         .timeout(Duration::from_secs(30))
//!         .default_header("Accept", "application/json")?
//!         .build()?;
//!
//!     // GET with query parameters
//!     let mut query = serde_json::Map::new();
//!     query.insert("page".to_string(), json!(2));
//!     let route = Route::parse(Method::GET, "https://api.example.com", "users")?
//!         .with_parameters(query, ParameterEncoding::Url);
//!     let users = service.request_decoded_array::<User>(route).await?;
//!     println!("Fetched {} users in {:?}", users.len(), users.response.latency);
//!
//!     // POST with a JSON body
//!     let route = Route::parse(Method::POST, "https://api.example.com", "users")?
//!         .with_json(json!({ "email": "alice@example.com" }));
//!     let created = service.request_decoded::<User>(route).await?;
//!     println!("Created {} <{}>", created.id, created.email);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Routes** - Method, base URL, path and parameters encoded into a request
//! - **Validation** - Acceptable status range and `Accept`-driven content type checks
//! - **Decoding pipeline** - Raw bytes, JSON of a required shape, or a typed model
//! - **Cancellable tasks** - Abort in-flight requests and observe progress
//! - **Observers** - Per-service request lifecycle events and a ready-made logger
//! - **Status codes** - Classification and descriptions for any code in `100..=599`
//!
//! ## Error Handling
//!
//! Errors keep the response they were produced from, so the raw body of a
//! rejected or undecodable response is always available:
//!
//! ```no_run
//! use courier::{NetworkError, NetworkService, Route};
//! use http::Method;
//!
//! # async fn example() -> Result<(), NetworkError> {
//! # let service = NetworkService::builder().build()?;
//! let route = Route::parse(Method::GET, "https://api.example.com", "profile")?;
//! match service.request_json_object(route).await {
//!     Ok(profile) => println!("Profile: {:?}", profile.value),
//!     Err(NetworkError::Validation { reason, response }) => {
//!         eprintln!("Rejected ({}): {}", reason, response.text());
//!     }
//!     Err(NetworkError::UnexpectedShape { expected, actual, .. }) => {
//!         eprintln!("Expected {}, got {}", expected, actual);
//!     }
//!     Err(e) => {
//!         eprintln!("Other error: {}", e);
//!         if let Some(status) = e.status_code() {
//!             eprintln!("  {}", status.recovery_suggestion());
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod decode;
mod error;
mod logger;
mod notification;
mod response;
mod route;
mod service;
mod status;
mod task;

pub use decode::{ArrayPolicy, JsonKind};
pub use error::{EncodingError, NetworkError, Result, ValidationFailure};
pub use logger::{LogSink, NetworkLogger, TracingSink};
pub use notification::{NetworkObserver, ObserverId, RequestEvent, ResponseEvent};
pub use response::{HttpResponse, ResponseValue};
pub use route::{
    CustomEncoder, IntoRequest, ParameterEncoding, RequestDescriptor, RequestParameters, Route,
};
pub use service::{NetworkService, NetworkServiceBuilder};
pub use status::{HttpStatusCode, InvalidStatusCode};
pub use task::{CancelHandle, Task};
