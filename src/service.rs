//! The network service: sends requests and runs the decoding pipeline.
//!
//! [`NetworkService`] is the main entry point. Every operation issues exactly
//! one transport attempt and returns a [`Task`]. Use [`NetworkServiceBuilder`]
//! to configure the transport.

use crate::decode::{
    ArrayOf, ArrayPolicy, Decode, DecodeWith, Discard, JsonArray, JsonObject, JsonValue, Model,
    Optional, RawBytes,
};
use crate::error::{NetworkError, Result, ValidationFailure};
use crate::notification::{NetworkObserver, ObserverId, Observers, RequestEvent, ResponseEvent};
use crate::response::{HttpResponse, ResponseValue};
use crate::route::{parse_header, IntoRequest, RequestDescriptor};
use crate::task::Task;
use bytes::Bytes;
use http::header::{ACCEPT, USER_AGENT};
use http::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Sends requests and decodes their responses.
///
/// The service is cheap to clone; clones share the transport and the
/// observer list.
///
/// # Examples
///
/// ```no_run
/// use courier::{NetworkService, Route};
/// use http::Method;
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: String,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), courier::NetworkError> {
/// let service = NetworkService::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let route = Route::parse(Method::GET, "https://api.example.com", "users/1")?;
/// let user = service.request_decoded::<User>(route).await?;
/// println!("{} <{}>", user.id, user.email);
///
/// let route = Route::parse(Method::GET, "https://api.example.com", "users")?;
/// let users = service.request_decoded_array::<User>(route).value().await?;
/// println!("{} users", users.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NetworkService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    http_client: reqwest::Client,
    default_headers: HeaderMap,
    acceptable_status: Range<u16>,
    observers: Observers,
}

impl NetworkService {
    /// Creates a new `NetworkServiceBuilder`.
    pub fn builder() -> NetworkServiceBuilder {
        NetworkServiceBuilder::new()
    }

    /// Creates a service around an existing `reqwest` client, with default validation.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                http_client,
                default_headers: HeaderMap::new(),
                acceptable_status: 200..300,
                observers: Observers::default(),
            }),
        }
    }

    /// Registers an observer for request lifecycle events.
    pub fn add_observer(&self, observer: Arc<dyn NetworkObserver>) -> ObserverId {
        self.inner.observers.add(observer)
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.inner.observers
    }

    /// Sends a request and decodes the body with `decoder`.
    ///
    /// All other request methods are shorthands for this one.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use courier::decode::{JsonObject, Optional};
    /// use courier::{NetworkService, Route};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), courier::NetworkError> {
    /// let service = NetworkService::builder().build()?;
    /// let route = Route::parse(Method::DELETE, "https://api.example.com", "sessions/current")?;
    ///
    /// // The server may answer with an empty body or a JSON object.
    /// let response = service.request(route, Optional(JsonObject)).await?;
    /// if let Some(object) = response.value {
    ///     println!("{:?}", object);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn request<D: Decode>(&self, request: impl IntoRequest, decoder: D) -> Task<D::Output> {
        let descriptor = request.into_request();
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let inner = Arc::clone(&self.inner);

        Task::spawn(
            async move {
                let response = inner.execute(&descriptor, &progress_tx).await?;
                drop(progress_tx);

                match decoder.decode(&response.body) {
                    Ok(value) => Ok(ResponseValue::new(value, response)),
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            status = response.status.as_u16(),
                            url = %response.url,
                            raw_response = %response.text(),
                            "Failed to decode response"
                        );
                        Err(e.with_response(response))
                    }
                }
            },
            progress_rx,
        )
    }

    /// Sends a request and resolves with the raw body.
    pub fn request_data(&self, request: impl IntoRequest) -> Task<Bytes> {
        self.request(request, RawBytes)
    }

    /// Sends a request and ignores the body.
    ///
    /// Useful for calls whose response body carries no information.
    pub fn request_empty(&self, request: impl IntoRequest) -> Task<()> {
        self.request(request, Discard)
    }

    /// Sends a request and parses the body as any JSON value.
    pub fn request_json(&self, request: impl IntoRequest) -> Task<Value> {
        self.request(request, JsonValue)
    }

    /// Like [`request_json`](Self::request_json), but an empty body resolves with `None`.
    pub fn request_json_optional(&self, request: impl IntoRequest) -> Task<Option<Value>> {
        self.request(request, Optional(JsonValue))
    }

    /// Sends a request and requires a JSON object body.
    pub fn request_json_object(&self, request: impl IntoRequest) -> Task<Map<String, Value>> {
        self.request(request, JsonObject)
    }

    /// Like [`request_json_object`](Self::request_json_object), but an empty body
    /// resolves with `None`.
    pub fn request_json_object_optional(
        &self,
        request: impl IntoRequest,
    ) -> Task<Option<Map<String, Value>>> {
        self.request(request, Optional(JsonObject))
    }

    /// Sends a request and requires a JSON array body.
    pub fn request_json_array(&self, request: impl IntoRequest) -> Task<Vec<Value>> {
        self.request(request, JsonArray)
    }

    /// Like [`request_json_array`](Self::request_json_array), but an empty body
    /// resolves with `None`.
    pub fn request_json_array_optional(
        &self,
        request: impl IntoRequest,
    ) -> Task<Option<Vec<Value>>> {
        self.request(request, Optional(JsonArray))
    }

    /// Sends a request and decodes the JSON body into `T`.
    pub fn request_decoded<T>(&self, request: impl IntoRequest) -> Task<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request(request, Model::<T>::new())
    }

    /// Sends a request and decodes the JSON body with `f`.
    pub fn request_decoded_with<T, E, F>(&self, request: impl IntoRequest, f: F) -> Task<T>
    where
        F: Fn(&Value) -> std::result::Result<T, E> + Send + Sync + 'static,
        T: Send + 'static,
        E: fmt::Display,
    {
        self.request(request, DecodeWith::new(f))
    }

    /// Sends a request, requires a JSON array body and decodes every element into `T`.
    ///
    /// One bad element fails the whole array; see
    /// [`request_decoded_array_with_policy`](Self::request_decoded_array_with_policy).
    pub fn request_decoded_array<T>(&self, request: impl IntoRequest) -> Task<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request_decoded_array_with_policy(request, ArrayPolicy::FailFast)
    }

    /// Like [`request_decoded_array`](Self::request_decoded_array) with an explicit
    /// policy for elements that fail to decode.
    pub fn request_decoded_array_with_policy<T>(
        &self,
        request: impl IntoRequest,
        policy: ArrayPolicy,
    ) -> Task<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request(request, ArrayOf::new(Model::<T>::new()).policy(policy))
    }
}

impl fmt::Debug for NetworkService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkService")
            .field("acceptable_status", &self.inner.acceptable_status)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

impl ServiceInner {
    /// Runs one transport attempt, publishing the lifecycle events around it.
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        progress: &watch::Sender<f32>,
    ) -> Result<HttpResponse> {
        tracing::debug!(
            method = %descriptor.method,
            url = %descriptor.url,
            "Executing HTTP request"
        );
        self.observers.notify_request(&RequestEvent {
            request: descriptor,
        });

        let start_time = Instant::now();
        let result = self.send(descriptor, progress, start_time).await;
        let duration = start_time.elapsed();

        match &result {
            Ok(response) => tracing::info!(
                status = response.status.as_u16(),
                latency_ms = duration.as_millis(),
                url = %descriptor.url,
                "Received HTTP response"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                method = %descriptor.method,
                url = %descriptor.url,
                "Request failed"
            ),
        }

        let (response, error) = match &result {
            Ok(response) => (Some(response), None),
            Err(e) => (e.response(), Some(e)),
        };
        self.observers.notify_response(&ResponseEvent {
            request: descriptor,
            response,
            error,
            duration,
        });

        result
    }

    async fn send(
        &self,
        descriptor: &RequestDescriptor,
        progress: &watch::Sender<f32>,
        start_time: Instant,
    ) -> Result<HttpResponse> {
        let mut request = self
            .http_client
            .request(descriptor.method.clone(), descriptor.url.clone())
            .headers(descriptor.headers.clone());
        if let Some(body) = &descriptor.body {
            request = request.body(body.clone());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| NetworkError::from_transport(e, None))?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let expected_length = response.content_length().filter(|length| *length > 0);

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if let Some(total) = expected_length {
                        progress.send_replace((body.len() as f64 / total as f64).min(1.0) as f32);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let partial = HttpResponse {
                        url,
                        status,
                        headers,
                        body: Bytes::from(body),
                        latency: start_time.elapsed(),
                    };
                    return Err(NetworkError::from_transport(e, Some(partial)));
                }
            }
        }
        progress.send_replace(1.0);

        let response = HttpResponse {
            url,
            status,
            headers,
            body: Bytes::from(body),
            latency: start_time.elapsed(),
        };

        match self.validate(descriptor, &response) {
            Ok(()) => Ok(response),
            Err(reason) => {
                if status.is_client_error() {
                    tracing::error!(
                        status = status.as_u16(),
                        response = %response.text(),
                        "Client error (4xx)"
                    );
                } else if status.is_server_error() {
                    tracing::warn!(
                        status = status.as_u16(),
                        response = %response.text(),
                        "Server error (5xx)"
                    );
                }
                Err(NetworkError::Validation {
                    reason,
                    response: Box::new(response),
                })
            }
        }
    }

    /// Checks the status against the acceptable range and the content type
    /// against the request's `Accept` header, or the service default.
    fn validate(
        &self,
        descriptor: &RequestDescriptor,
        response: &HttpResponse,
    ) -> std::result::Result<(), ValidationFailure> {
        let status = response.status.as_u16();
        if !self.acceptable_status.contains(&status) {
            return Err(ValidationFailure::UnacceptableStatus { status });
        }

        if response.body.is_empty() {
            return Ok(());
        }

        let acceptable = if descriptor.headers.contains_key(ACCEPT) {
            acceptable_media_ranges(&descriptor.headers)
        } else {
            acceptable_media_ranges(&self.default_headers)
        };
        if acceptable.iter().any(|range| range == "*/*") {
            return Ok(());
        }

        let content_type = match response.content_type() {
            Some(content_type) => media_type(content_type),
            None => return Err(ValidationFailure::MissingContentType { acceptable }),
        };

        if acceptable
            .iter()
            .any(|range| media_range_matches(range, &content_type))
        {
            Ok(())
        } else {
            Err(ValidationFailure::UnacceptableContentType {
                content_type,
                acceptable,
            })
        }
    }
}

/// Media ranges from the `Accept` header, `*/*` when there is none.
fn acceptable_media_ranges(headers: &HeaderMap) -> Vec<String> {
    let ranges: Vec<String> = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(media_type)
        .filter(|range| !range.is_empty())
        .collect();

    if ranges.is_empty() {
        vec!["*/*".to_string()]
    } else {
        ranges
    }
}

/// Strips parameters and normalizes case: `Application/JSON; charset=utf-8` -> `application/json`.
fn media_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn media_range_matches(range: &str, media_type: &str) -> bool {
    if range == "*/*" || range == media_type {
        return true;
    }
    match (range.split_once('/'), media_type.split_once('/')) {
        (Some((range_type, "*")), Some((actual_type, _))) => range_type == actual_type,
        _ => false,
    }
}

/// Builder for configuring and creating a [`NetworkService`].
///
/// # Examples
///
/// ```no_run
/// use courier::NetworkService;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), courier::NetworkError> {
/// let service = NetworkService::builder()
///     .timeout(Duration::from_secs(30))
///     .default_header("Accept", "application/json")?
///     .user_agent("my-app/1.0")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct NetworkServiceBuilder {
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: String,
    acceptable_status: Range<u16>,
    http_client: Option<reqwest::Client>,
}

impl NetworkServiceBuilder {
    /// Creates a new `NetworkServiceBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            default_headers: HeaderMap::new(),
            timeout: None,
            connect_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            acceptable_status: 200..300,
            http_client: None,
        }
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the total request timeout, enforced by the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout, enforced by the transport.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the range of status codes that pass validation. Defaults to `200..300`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is empty or not within `100..600`.
    pub fn acceptable_status(mut self, range: Range<u16>) -> Result<Self> {
        if range.is_empty() || range.start < 100 || range.end > 600 {
            return Err(NetworkError::ConfigurationError(format!(
                "Invalid acceptable status range: {:?}",
                range
            )));
        }
        self.acceptable_status = range;
        Ok(self)
    }

    /// Uses an existing `reqwest` client as the transport.
    ///
    /// Timeouts and the user agent are ignored when a client is supplied;
    /// configure them on the client instead. Default headers are then only
    /// used for validation.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configured `NetworkService`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be created.
    pub fn build(self) -> Result<NetworkService> {
        let default_headers = self.default_headers;
        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut default_headers = default_headers.clone();
                if !default_headers.contains_key(USER_AGENT) {
                    let user_agent = HeaderValue::try_from(self.user_agent.as_str()).map_err(|e| {
                        NetworkError::ConfigurationError(format!("Invalid user agent: {}", e))
                    })?;
                    default_headers.insert(USER_AGENT, user_agent);
                }

                let mut builder = reqwest::Client::builder().default_headers(default_headers);
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build().map_err(|e| {
                    NetworkError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })?
            }
        };

        Ok(NetworkService {
            inner: Arc::new(ServiceInner {
                http_client,
                default_headers,
                acceptable_status: self.acceptable_status,
                observers: Observers::default(),
            }),
        })
    }
}

impl Default for NetworkServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn response(content_type: Option<&'static str>, body: &'static str) -> HttpResponse {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        HttpResponse {
            url: url::Url::parse("https://example.com").unwrap(),
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(body.as_bytes()),
            latency: Duration::ZERO,
        }
    }

    fn descriptor(accept: Option<&'static str>) -> RequestDescriptor {
        let mut request = RequestDescriptor::new(
            http::Method::GET,
            url::Url::parse("https://example.com").unwrap(),
        );
        if let Some(accept) = accept {
            request.headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }
        request
    }

    fn inner() -> ServiceInner {
        ServiceInner {
            http_client: reqwest::Client::new(),
            default_headers: HeaderMap::new(),
            acceptable_status: 200..300,
            observers: Observers::default(),
        }
    }

    #[test]
    fn test_media_type_normalization() {
        assert_eq!(media_type("Application/JSON; charset=utf-8"), "application/json");
        assert_eq!(media_type(" text/html "), "text/html");
    }

    #[test]
    fn test_media_range_matching() {
        assert!(media_range_matches("*/*", "image/png"));
        assert!(media_range_matches("application/*", "application/json"));
        assert!(media_range_matches("application/json", "application/json"));
        assert!(!media_range_matches("application/json", "text/html"));
        assert!(!media_range_matches("text/*", "application/json"));
    }

    #[test]
    fn test_accept_header_defaults_to_any() {
        assert_eq!(acceptable_media_ranges(&HeaderMap::new()), vec!["*/*"]);

        let request = descriptor(Some("application/json, text/*;q=0.5"));
        assert_eq!(
            acceptable_media_ranges(&request.headers),
            vec!["application/json", "text/*"]
        );
    }

    #[test]
    fn test_validate_content_type() {
        let service = inner();
        let json_request = descriptor(Some("application/json"));

        assert!(service
            .validate(&json_request, &response(Some("application/json; charset=utf-8"), "{}"))
            .is_ok());
        assert!(service.validate(&json_request, &response(None, "")).is_ok());
        assert!(service.validate(&descriptor(None), &response(None, "{}")).is_ok());

        assert_eq!(
            service.validate(&json_request, &response(Some("text/html"), "<html>")),
            Err(ValidationFailure::UnacceptableContentType {
                content_type: "text/html".to_string(),
                acceptable: vec!["application/json".to_string()],
            })
        );
        assert!(matches!(
            service.validate(&json_request, &response(None, "{}")),
            Err(ValidationFailure::MissingContentType { .. })
        ));
    }

    #[test]
    fn test_validate_status() {
        let service = inner();
        let mut not_found = response(Some("application/json"), "{}");
        not_found.status = StatusCode::NOT_FOUND;

        assert_eq!(
            service.validate(&descriptor(None), &not_found),
            Err(ValidationFailure::UnacceptableStatus { status: 404 })
        );
    }

    #[test]
    fn test_builder_rejects_invalid_configuration() {
        assert!(NetworkService::builder().acceptable_status(300..300).is_err());
        assert!(NetworkService::builder().acceptable_status(0..700).is_err());
        assert!(NetworkService::builder()
            .default_header("X-Bad\n", "value")
            .is_err());
    }
}
