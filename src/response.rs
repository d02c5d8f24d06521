//! Response envelope types.
//!
//! [`HttpResponse`] is the raw metadata and payload of a received response.
//! [`ResponseValue`] pairs a decoded value with the `HttpResponse` that
//! produced it, so timing information, headers and the raw body remain
//! available after decoding.

use crate::status::HttpStatusCode;
use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// A received HTTP response: status, headers, raw body and timing.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The final URL of the response, after redirects.
    pub url: Url,

    /// The status code reported by the transport.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The raw response body.
    pub body: Bytes,

    /// Time from sending the request until the body was fully received.
    pub latency: Duration,
}

impl HttpResponse {
    /// Returns the classified status code.
    ///
    /// `None` if the transport reported a status outside `100..=599`.
    pub fn status_code(&self) -> Option<HttpStatusCode> {
        HttpStatusCode::try_from(self.status).ok()
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the `Content-Type` header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    /// Returns the body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parses the raw body as JSON.
    ///
    /// Useful on failed requests, where the body is preserved on the error
    /// but was never parsed.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// A decoded value together with the response it was decoded from.
///
/// # Examples
///
/// ```no_run
/// use courier::{NetworkService, Route};
/// use http::Method;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: String,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), courier::NetworkError> {
/// let service = NetworkService::builder().build()?;
/// let route = Route::parse(Method::GET, "https://api.example.com", "users/1")?;
///
/// let user = service.request_decoded::<User>(route).await?;
/// println!("{} <{}>", user.value.id, user.email);
/// println!("Status: {:?}", user.status_code());
/// println!("Request took {:?}", user.response.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ResponseValue<T> {
    /// The decoded value.
    pub value: T,

    /// The response the value was decoded from.
    pub response: HttpResponse,
}

impl<T> ResponseValue<T> {
    /// Creates a new `ResponseValue`.
    pub fn new(value: T, response: HttpResponse) -> Self {
        Self { value, response }
    }

    /// Returns the classified status code of the response.
    pub fn status_code(&self) -> Option<HttpStatusCode> {
        self.response.status_code()
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.header(name)
    }

    /// Discards the response metadata and returns the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Maps the value to a different type, preserving the response metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use courier::{HttpResponse, ResponseValue};
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = HttpResponse {
    ///     url: "https://example.com/count".parse().unwrap(),
    ///     status: StatusCode::OK,
    ///     headers: HeaderMap::new(),
    ///     body: "42".into(),
    ///     latency: Duration::from_millis(100),
    /// };
    ///
    /// let value = ResponseValue::new(42, response).map(|n| n.to_string());
    /// assert_eq!(value.value, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> ResponseValue<U>
    where
        F: FnOnce(T) -> U,
    {
        ResponseValue {
            value: f(self.value),
            response: self.response,
        }
    }
}

impl<T> AsRef<T> for ResponseValue<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::Deref for ResponseValue<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
