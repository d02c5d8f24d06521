//! Outbound request descriptions.
//!
//! A [`Route`] is an immutable description of an endpoint call: base URL,
//! path, method, optional parameters and additional headers. [`Route::make`]
//! turns it into a ready-to-send [`RequestDescriptor`].

use crate::error::EncodingError;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use url::Url;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// A fully-resolved outbound request: method, absolute URL, headers and body.
///
/// Two descriptors compare equal when they describe the same request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,

    /// The absolute request URL, query string included.
    pub url: Url,

    /// The request headers.
    pub headers: HeaderMap,

    /// The request body.
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    /// Creates a descriptor with no headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    fn set_content_type_if_missing(&mut self, content_type: &'static str) {
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
}

/// Conversion into a [`RequestDescriptor`], accepted by every
/// [`NetworkService`](crate::NetworkService) operation.
pub trait IntoRequest {
    /// Produces the descriptor to send.
    fn into_request(self) -> RequestDescriptor;
}

impl IntoRequest for RequestDescriptor {
    fn into_request(self) -> RequestDescriptor {
        self
    }
}

impl IntoRequest for &RequestDescriptor {
    fn into_request(self) -> RequestDescriptor {
        self.clone()
    }
}

/// Sends the best-effort descriptor; encoding errors were already logged by
/// [`Route::make`].
impl IntoRequest for &Route {
    fn into_request(self) -> RequestDescriptor {
        self.make().0
    }
}

impl IntoRequest for Route {
    fn into_request(self) -> RequestDescriptor {
        self.make().0
    }
}

/// Signature of a caller-supplied parameter encoder.
pub type CustomEncoder = Arc<
    dyn Fn(RequestDescriptor, &Map<String, Value>) -> (RequestDescriptor, Option<EncodingError>)
        + Send
        + Sync,
>;

/// How a parameter dictionary is written into a request.
#[derive(Clone, Default)]
pub enum ParameterEncoding {
    /// Query string for `GET`, `HEAD` and `DELETE`; form body otherwise.
    #[default]
    Url,

    /// Always the query string.
    QueryString,

    /// Always a `application/x-www-form-urlencoded` body.
    FormBody,

    /// A JSON object body.
    Json,

    /// A caller-supplied encoder.
    Custom(CustomEncoder),
}

impl fmt::Debug for ParameterEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterEncoding::Url => f.write_str("Url"),
            ParameterEncoding::QueryString => f.write_str("QueryString"),
            ParameterEncoding::FormBody => f.write_str("FormBody"),
            ParameterEncoding::Json => f.write_str("Json"),
            ParameterEncoding::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl ParameterEncoding {
    /// Writes `parameters` into `descriptor`.
    ///
    /// On failure the descriptor is returned unmodified alongside the error.
    pub fn encode(
        &self,
        descriptor: RequestDescriptor,
        parameters: &Map<String, Value>,
    ) -> (RequestDescriptor, Option<EncodingError>) {
        match self {
            ParameterEncoding::Url => {
                if encodes_in_url(&descriptor.method) {
                    encode_query(descriptor, parameters)
                } else {
                    encode_form(descriptor, parameters)
                }
            }
            ParameterEncoding::QueryString => encode_query(descriptor, parameters),
            ParameterEncoding::FormBody => encode_form(descriptor, parameters),
            ParameterEncoding::Json => {
                encode_json(descriptor, &Value::Object(parameters.clone()))
            }
            ParameterEncoding::Custom(encoder) => encoder(descriptor, parameters),
        }
    }
}

/// Parameters attached to a [`Route`].
#[derive(Debug, Clone)]
pub enum RequestParameters {
    /// A JSON document sent as the request body.
    Json(Value),

    /// A parameter dictionary written with the given encoding.
    Dictionary {
        /// The parameters.
        parameters: Map<String, Value>,
        /// How to write them into the request.
        encoding: ParameterEncoding,
    },
}

impl RequestParameters {
    /// Writes these parameters into `descriptor`.
    pub fn encode(
        &self,
        descriptor: RequestDescriptor,
    ) -> (RequestDescriptor, Option<EncodingError>) {
        match self {
            RequestParameters::Json(json) => encode_json(descriptor, json),
            RequestParameters::Dictionary {
                parameters,
                encoding,
            } => encoding.encode(descriptor, parameters),
        }
    }
}

/// An endpoint description that builds [`RequestDescriptor`]s.
///
/// # Examples
///
/// ```
/// use courier::Route;
/// use http::Method;
/// use serde_json::json;
///
/// let route = Route::parse(Method::POST, "https://api.example.com/v1", "users")
///     .unwrap()
///     .with_json(json!({ "email": "user@example.com" }))
///     .with_header("X-Request-Id", "abc123")
///     .unwrap();
///
/// let (request, error) = route.make();
/// assert!(error.is_none());
/// assert_eq!(request.url.as_str(), "https://api.example.com/v1/users");
/// assert_eq!(request.header("content-type"), Some("application/json"));
/// assert_eq!(request.header("x-request-id"), Some("abc123"));
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    base_url: Url,
    path: String,
    method: Method,
    parameters: Option<RequestParameters>,
    additional_headers: HeaderMap,
}

impl Route {
    /// Creates a route with no parameters and no additional headers.
    pub fn new(method: Method, base_url: Url, path: impl Into<String>) -> Self {
        Self {
            base_url,
            path: path.into(),
            method,
            parameters: None,
            additional_headers: HeaderMap::new(),
        }
    }

    /// Creates a route, parsing the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid absolute URL.
    pub fn parse(
        method: Method,
        base_url: impl AsRef<str>,
        path: impl Into<String>,
    ) -> crate::Result<Self> {
        Ok(Self::new(method, Url::parse(base_url.as_ref())?, path))
    }

    /// Sets a JSON document as the request body.
    pub fn with_json(mut self, json: Value) -> Self {
        self.parameters = Some(RequestParameters::Json(json));
        self
    }

    /// Sets a parameter dictionary written with `encoding`.
    pub fn with_parameters(
        mut self,
        parameters: Map<String, Value>,
        encoding: ParameterEncoding,
    ) -> Self {
        self.parameters = Some(RequestParameters::Dictionary {
            parameters,
            encoding,
        });
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> crate::Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.additional_headers.insert(name, value);
        Ok(self)
    }

    /// Adds several headers to the request.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.additional_headers.extend(headers);
        self
    }

    /// The base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The path appended to the base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request parameters.
    pub fn parameters(&self) -> Option<&RequestParameters> {
        self.parameters.as_ref()
    }

    /// Headers added on top of the service defaults.
    pub fn additional_headers(&self) -> &HeaderMap {
        &self.additional_headers
    }

    /// The base URL with each component of the path appended.
    ///
    /// An empty path returns the base URL unchanged, trailing slash included.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot have path components.
    pub fn url(&self) -> Result<Url, EncodingError> {
        let components: Vec<&str> = self
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let mut url = self.base_url.clone();
        if components.is_empty() {
            return Ok(url);
        }

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| EncodingError::CannotBeABase(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.extend(components);
        }
        Ok(url)
    }

    /// Builds the request descriptor.
    ///
    /// Never fails: if the URL cannot be joined or the parameters cannot be
    /// encoded, the error is logged and returned next to a best-effort
    /// descriptor.
    pub fn make(&self) -> (RequestDescriptor, Option<EncodingError>) {
        let (url, url_error) = match self.url() {
            Ok(url) => (url, None),
            Err(e) => (self.base_url.clone(), Some(e)),
        };

        let mut descriptor = RequestDescriptor::new(self.method.clone(), url);
        for (name, value) in &self.additional_headers {
            descriptor.headers.append(name.clone(), value.clone());
        }

        let (descriptor, encoding_error) = match &self.parameters {
            Some(parameters) => parameters.encode(descriptor),
            None => (descriptor, None),
        };

        let error = url_error.or(encoding_error);
        if let Some(e) = &error {
            tracing::warn!(
                error = %e,
                method = %self.method,
                path = %self.path,
                "Unable to encode request parameters"
            );
        }

        (descriptor, error)
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> crate::Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name).map_err(|e| {
        crate::NetworkError::ConfigurationError(format!("Invalid header name: {}", e))
    })?;
    let value = HeaderValue::try_from(value).map_err(|e| {
        crate::NetworkError::ConfigurationError(format!("Invalid header value: {}", e))
    })?;
    Ok((name, value))
}

fn encodes_in_url(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD || *method == Method::DELETE
}

fn encode_json(
    mut descriptor: RequestDescriptor,
    json: &Value,
) -> (RequestDescriptor, Option<EncodingError>) {
    match serde_json::to_vec(json) {
        Ok(body) => {
            descriptor.set_content_type_if_missing(JSON_CONTENT_TYPE);
            descriptor.body = Some(Bytes::from(body));
            (descriptor, None)
        }
        Err(e) => (descriptor, Some(EncodingError::Json(e))),
    }
}

fn encode_query(
    mut descriptor: RequestDescriptor,
    parameters: &Map<String, Value>,
) -> (RequestDescriptor, Option<EncodingError>) {
    let pairs = match flatten_parameters(parameters) {
        Ok(pairs) => pairs,
        Err(e) => return (descriptor, Some(e)),
    };

    if !pairs.is_empty() {
        descriptor.url.query_pairs_mut().extend_pairs(pairs);
    }
    (descriptor, None)
}

fn encode_form(
    mut descriptor: RequestDescriptor,
    parameters: &Map<String, Value>,
) -> (RequestDescriptor, Option<EncodingError>) {
    let pairs = match flatten_parameters(parameters) {
        Ok(pairs) => pairs,
        Err(e) => return (descriptor, Some(e)),
    };

    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    descriptor.set_content_type_if_missing(FORM_CONTENT_TYPE);
    descriptor.body = Some(Bytes::from(body));
    (descriptor, None)
}

/// Flattens nested parameters into `key[sub]` / `key[]` pairs, sorted by key.
fn flatten_parameters(
    parameters: &Map<String, Value>,
) -> Result<Vec<(String, String)>, EncodingError> {
    let mut pairs = Vec::new();
    let mut keys: Vec<&String> = parameters.keys().collect();
    keys.sort();

    for key in keys {
        flatten_value(key.clone(), &parameters[key.as_str()], &mut pairs)?;
    }
    Ok(pairs)
}

fn flatten_value(
    key: String,
    value: &Value,
    pairs: &mut Vec<(String, String)>,
) -> Result<(), EncodingError> {
    match value {
        Value::Null => return Err(EncodingError::NullValue { key }),
        Value::Bool(flag) => pairs.push((key, flag.to_string())),
        Value::Number(number) => pairs.push((key, number.to_string())),
        Value::String(text) => pairs.push((key, text.clone())),
        Value::Array(items) => {
            for item in items {
                flatten_value(format!("{}[]", key), item, pairs)?;
            }
        }
        Value::Object(map) => {
            let mut nested: Vec<&String> = map.keys().collect();
            nested.sort();
            for nested_key in nested {
                let nested_value = &map[nested_key.as_str()];
                flatten_value(format!("{}[{}]", key, nested_key), nested_value, pairs)?;
            }
        }
    }
    Ok(())
}
