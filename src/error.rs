//! Error types for requests made through the network service.
//!
//! Every failure a request can resolve with is a [`NetworkError`]. Whenever a
//! response was received before the failure (validation, parse, shape and
//! decode errors, and transport errors raised while reading the body), the
//! error keeps the full [`HttpResponse`] so the raw payload stays inspectable.

use crate::decode::JsonKind;
use crate::response::HttpResponse;
use crate::status::HttpStatusCode;

/// The error type for requests made through a [`NetworkService`](crate::NetworkService).
///
/// # Examples
///
/// ```no_run
/// use courier::{NetworkError, NetworkService, Route};
/// use http::Method;
///
/// # async fn example() -> Result<(), NetworkError> {
/// let service = NetworkService::builder().build()?;
/// let route = Route::parse(Method::GET, "https://api.example.com", "/profile")?;
///
/// match service.request_json_object(route).await {
///     Ok(profile) => println!("Profile: {:?}", profile.value),
///     Err(NetworkError::Validation { reason, response }) => {
///         eprintln!("Rejected ({}): {}", reason, response.text());
///     }
///     Err(NetworkError::UnexpectedShape { expected, actual, .. }) => {
///         eprintln!("Expected {}, got {}", expected, actual);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    /// The transport failed (connection refused, DNS, TLS, body read failure).
    ///
    /// `response` is present when the failure happened after the response
    /// head was received.
    #[error("Network error: {source}")]
    Transport {
        /// The underlying transport error.
        source: reqwest::Error,
        /// The partially received response, if any.
        response: Option<Box<HttpResponse>>,
    },

    /// The transport gave up waiting for the server.
    ///
    /// `response` is present when the timeout fired while the body was
    /// being read; it holds the status, headers and the bytes received so far.
    #[error("Request timed out: {source}")]
    Timeout {
        /// The underlying transport error.
        source: reqwest::Error,
        /// The partially received response, if any.
        response: Option<Box<HttpResponse>>,
    },

    /// The response status code or content type was not acceptable.
    #[error("Response validation failed: {reason}")]
    Validation {
        /// What did not validate.
        reason: ValidationFailure,
        /// The rejected response, body included.
        response: Box<HttpResponse>,
    },

    /// The response body was not well-formed JSON.
    #[error("Failed to parse JSON response (status {}): {source}", .response.status)]
    Parse {
        /// The parser error.
        source: serde_json::Error,
        /// The response whose body failed to parse.
        response: Box<HttpResponse>,
    },

    /// The body parsed as JSON but was not the structural kind required.
    #[error("Unexpected JSON shape: expected {expected}, got {actual}")]
    UnexpectedShape {
        /// The kind the caller asked for.
        expected: JsonKind,
        /// The kind that was received.
        actual: JsonKind,
        /// The response carrying the unexpected value.
        response: Box<HttpResponse>,
    },

    /// The JSON had the right shape but could not be decoded into the target type.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// The decoder's error message.
        message: String,
        /// Index of the failing element when decoding an array.
        index: Option<usize>,
        /// The response that failed to decode.
        response: Box<HttpResponse>,
    },

    /// Request parameters could not be encoded.
    #[error("Failed to encode request parameters: {0}")]
    Encoding(#[from] EncodingError),

    /// The request was cancelled before it completed.
    #[error("Request was cancelled")]
    Cancelled,

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Why a received response failed validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The status code is outside the service's acceptable range.
    #[error("status code {status} is not acceptable")]
    UnacceptableStatus {
        /// The received status code.
        status: u16,
    },

    /// The response content type does not match the request's `Accept` header.
    #[error("content type `{content_type}` is not acceptable (expected one of {acceptable:?})")]
    UnacceptableContentType {
        /// The received media type, without parameters.
        content_type: String,
        /// The media ranges the request accepts.
        acceptable: Vec<String>,
    },

    /// The response has a body but no content type.
    #[error("response has no content type (expected one of {acceptable:?})")]
    MissingContentType {
        /// The media ranges the request accepts.
        acceptable: Vec<String>,
    },
}

/// Failure to encode request parameters into a request descriptor.
///
/// Encoding errors never abort building a descriptor; they are logged and
/// returned next to the best-effort descriptor by [`Route::make`](crate::Route::make).
#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    /// The JSON body could not be serialized.
    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// A `null` value cannot be expressed in a query string or form body.
    #[error("cannot encode null value for parameter `{key}`")]
    NullValue {
        /// The flattened parameter key, e.g. `filter[owner]`.
        key: String,
    },

    /// The base URL cannot have path components appended (e.g. `mailto:`).
    #[error("cannot append path to base URL `{0}`")]
    CannotBeABase(String),

    /// Error reported by a custom parameter encoder.
    #[error("{0}")]
    Custom(String),
}

impl NetworkError {
    /// Returns the received response, if the failure happened after one arrived.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            NetworkError::Transport { response, .. } => response.as_deref(),
            NetworkError::Timeout { response, .. } => response.as_deref(),
            NetworkError::Validation { response, .. } => Some(response),
            NetworkError::Parse { response, .. } => Some(response),
            NetworkError::UnexpectedShape { response, .. } => Some(response),
            NetworkError::Decode { response, .. } => Some(response),
            NetworkError::Encoding(_)
            | NetworkError::Cancelled
            | NetworkError::ConfigurationError(_)
            | NetworkError::InvalidUrl(_) => None,
        }
    }

    /// Returns the classified status code of the received response.
    ///
    /// `None` when no response was received or its status is outside `100..=599`.
    pub fn status_code(&self) -> Option<HttpStatusCode> {
        self.response()?.status_code()
    }

    /// Returns the raw body of the received response.
    pub fn raw_body(&self) -> Option<&[u8]> {
        self.response().map(|response| response.body.as_ref())
    }

    /// Returns `true` if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetworkError::Cancelled)
    }

    /// Returns `true` if the transport timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout { .. })
    }

    pub(crate) fn from_transport(source: reqwest::Error, response: Option<HttpResponse>) -> Self {
        let response = response.map(Box::new);
        if source.is_timeout() {
            NetworkError::Timeout { source, response }
        } else {
            NetworkError::Transport { source, response }
        }
    }
}

/// A specialized `Result` type for network requests.
pub type Result<T> = std::result::Result<T, NetworkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};
    use std::time::Duration;

    fn response(status: u16, body: &'static str) -> HttpResponse {
        HttpResponse {
            url: url::Url::parse("https://example.com/path").unwrap(),
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
            latency: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_validation_error_keeps_response() {
        let err = NetworkError::Validation {
            reason: ValidationFailure::UnacceptableStatus { status: 404 },
            response: Box::new(response(404, r#"{"error":"missing"}"#)),
        };

        assert_eq!(err.status_code(), Some(HttpStatusCode::NOT_FOUND));
        assert_eq!(err.raw_body(), Some(br#"{"error":"missing"}"#.as_ref()));
        assert_eq!(
            err.to_string(),
            "Response validation failed: status code 404 is not acceptable"
        );
    }

    #[test]
    fn test_shape_error_message() {
        let err = NetworkError::UnexpectedShape {
            expected: JsonKind::Object,
            actual: JsonKind::Array,
            response: Box::new(response(200, "[]")),
        };

        assert!(err.to_string().contains("expected object, got array"));
        assert_eq!(err.status_code(), Some(HttpStatusCode::OK));
    }

    #[test]
    fn test_errors_without_response() {
        assert!(NetworkError::Cancelled.response().is_none());
        assert!(NetworkError::Cancelled.is_cancelled());
        assert!(!NetworkError::Cancelled.is_timeout());

        let err = NetworkError::from(EncodingError::NullValue {
            key: "filter[owner]".to_string(),
        });
        assert!(err.raw_body().is_none());
        assert!(err.to_string().contains("filter[owner]"));
    }

    #[test]
    fn test_parse_error_mentions_status() {
        let source = serde_json::from_slice::<serde_json::Value>(b"not json").unwrap_err();
        let err = NetworkError::Parse {
            source,
            response: Box::new(response(200, "not json")),
        };

        assert!(err.to_string().starts_with("Failed to parse JSON response (status 200 OK)"));
    }
}
