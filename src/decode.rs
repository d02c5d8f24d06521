//! The response decoding pipeline.
//!
//! Every request made through the service runs its body through a [`Decode`]
//! implementation. The built-in decoders chain the stages
//! `bytes -> JSON value -> object/array -> model`, each stage failing with a
//! typed [`DecodeError`]. [`Optional`] wraps any decoder to treat an empty
//! body as "no value".

use crate::error::NetworkError;
use crate::response::HttpResponse;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// The structural kind of a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonKind {
    /// `null`
    Null,
    /// `true` or `false`
    Bool,
    /// Any JSON number.
    Number,
    /// A JSON string.
    String,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl JsonKind {
    /// Returns the kind of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonKind::Null,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(_) => JsonKind::Number,
            Value::String(_) => JsonKind::String,
            Value::Array(_) => JsonKind::Array,
            Value::Object(_) => JsonKind::Object,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            JsonKind::Null => "null",
            JsonKind::Bool => "bool",
            JsonKind::Number => "number",
            JsonKind::String => "string",
            JsonKind::Array => "array",
            JsonKind::Object => "object",
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure in one of the decoding stages.
///
/// The service attaches the response to turn this into a [`NetworkError`].
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The body is not well-formed JSON.
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The JSON value is not of the required kind.
    #[error("expected {expected}, got {actual}")]
    Shape {
        /// The required kind.
        expected: JsonKind,
        /// The received kind.
        actual: JsonKind,
    },

    /// The value could not be decoded into the target type.
    #[error("{message}")]
    Model {
        /// The decoder's message.
        message: String,
        /// The failing element when decoding an array.
        index: Option<usize>,
    },
}

impl DecodeError {
    /// Attaches the response the failure was decoded from.
    pub fn with_response(self, response: HttpResponse) -> NetworkError {
        let response = Box::new(response);
        match self {
            DecodeError::Parse(source) => NetworkError::Parse { source, response },
            DecodeError::Shape { expected, actual } => NetworkError::UnexpectedShape {
                expected,
                actual,
                response,
            },
            DecodeError::Model { message, index } => NetworkError::Decode {
                message: match index {
                    Some(i) => format!("element {}: {}", i, message),
                    None => message,
                },
                index,
                response,
            },
        }
    }

    fn shape(expected: JsonKind, actual: &Value) -> Self {
        DecodeError::Shape {
            expected,
            actual: JsonKind::of(actual),
        }
    }
}

/// Turns a raw response body into a value.
///
/// Implement this trait to plug a custom format into
/// [`NetworkService::request`](crate::NetworkService::request).
pub trait Decode: Send + Sync + 'static {
    /// The decoded value.
    type Output: Send + 'static;

    /// Decodes `body`.
    fn decode(&self, body: &Bytes) -> Result<Self::Output, DecodeError>;
}

/// Decodes an already-parsed JSON value into a model.
///
/// Used for single models and for each element of a model array.
pub trait DecodeValue: Send + Sync + 'static {
    /// The decoded model.
    type Output: Send + 'static;

    /// Decodes `value`, returning a human-readable message on failure.
    fn decode_value(&self, value: Value) -> Result<Self::Output, String>;
}

/// Returns the raw body unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBytes;

impl Decode for RawBytes {
    type Output = Bytes;

    fn decode(&self, body: &Bytes) -> Result<Bytes, DecodeError> {
        Ok(body.clone())
    }
}

/// Ignores the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Decode for Discard {
    type Output = ();

    fn decode(&self, _body: &Bytes) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Parses the body as any JSON value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValue;

impl Decode for JsonValue {
    type Output = Value;

    fn decode(&self, body: &Bytes) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Parses the body and requires a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObject;

impl Decode for JsonObject {
    type Output = Map<String, Value>;

    fn decode(&self, body: &Bytes) -> Result<Self::Output, DecodeError> {
        match JsonValue.decode(body)? {
            Value::Object(map) => Ok(map),
            other => Err(DecodeError::shape(JsonKind::Object, &other)),
        }
    }
}

/// Parses the body and requires a JSON array.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArray;

impl Decode for JsonArray {
    type Output = Vec<Value>;

    fn decode(&self, body: &Bytes) -> Result<Self::Output, DecodeError> {
        match JsonValue.decode(body)? {
            Value::Array(items) => Ok(items),
            other => Err(DecodeError::shape(JsonKind::Array, &other)),
        }
    }
}

/// Decodes the body into `T` through its `Deserialize` implementation.
pub struct Model<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Model<T> {
    /// Creates a decoder for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Model<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model<{}>", std::any::type_name::<T>())
    }
}

impl<T> DecodeValue for Model<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn decode_value(&self, value: Value) -> Result<T, String> {
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}

impl<T> Decode for Model<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn decode(&self, body: &Bytes) -> Result<T, DecodeError> {
        decode_model(self, body)
    }
}

/// Decodes the body into a model with a caller-supplied function.
///
/// # Examples
///
/// ```
/// use courier::decode::{Decode, DecodeWith};
/// use serde_json::Value;
///
/// let decoder = DecodeWith::new(|json: &Value| {
///     json["count"].as_u64().ok_or("missing count")
/// });
///
/// let body = bytes::Bytes::from_static(br#"{"count": 3}"#);
/// assert_eq!(decoder.decode(&body).unwrap(), 3);
/// ```
#[derive(Clone)]
pub struct DecodeWith<F> {
    f: F,
}

impl<F> DecodeWith<F> {
    /// Wraps a decoding function.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for DecodeWith<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecodeWith")
    }
}

impl<F, T, E> DecodeValue for DecodeWith<F>
where
    F: Fn(&Value) -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: fmt::Display,
{
    type Output = T;

    fn decode_value(&self, value: Value) -> Result<T, String> {
        (self.f)(&value).map_err(|e| e.to_string())
    }
}

impl<F, T, E> Decode for DecodeWith<F>
where
    F: Fn(&Value) -> Result<T, E> + Send + Sync + 'static,
    T: Send + 'static,
    E: fmt::Display,
{
    type Output = T;

    fn decode(&self, body: &Bytes) -> Result<T, DecodeError> {
        decode_model(self, body)
    }
}

fn decode_model<D: DecodeValue>(decoder: &D, body: &Bytes) -> Result<D::Output, DecodeError> {
    let value = JsonValue.decode(body)?;
    decoder
        .decode_value(value)
        .map_err(|message| DecodeError::Model {
            message,
            index: None,
        })
}

/// What to do when one element of a model array fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayPolicy {
    /// Fail the whole array, reporting the index of the first bad element.
    #[default]
    FailFast,

    /// Drop elements that fail to decode, logging a warning for each.
    SkipInvalid,
}

/// Requires a JSON array and decodes each element with `D`.
#[derive(Debug, Clone)]
pub struct ArrayOf<D> {
    element: D,
    policy: ArrayPolicy,
}

impl<D: DecodeValue> ArrayOf<D> {
    /// Decodes every element with `element`, failing on the first bad element.
    pub fn new(element: D) -> Self {
        Self {
            element,
            policy: ArrayPolicy::FailFast,
        }
    }

    /// Sets the policy for elements that fail to decode.
    pub fn policy(mut self, policy: ArrayPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<D: DecodeValue> Decode for ArrayOf<D> {
    type Output = Vec<D::Output>;

    fn decode(&self, body: &Bytes) -> Result<Self::Output, DecodeError> {
        let items = JsonArray.decode(body)?;
        let mut models = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            match self.element.decode_value(item) {
                Ok(model) => models.push(model),
                Err(message) => match self.policy {
                    ArrayPolicy::FailFast => {
                        return Err(DecodeError::Model {
                            message,
                            index: Some(index),
                        })
                    }
                    ArrayPolicy::SkipInvalid => {
                        tracing::warn!(
                            index = index,
                            error = %message,
                            "Skipping array element that failed to decode"
                        );
                    }
                },
            }
        }

        Ok(models)
    }
}

/// Treats a zero-length body as `None` and decodes anything else with `D`.
///
/// # Examples
///
/// ```
/// use courier::decode::{Decode, JsonObject, Optional};
///
/// let decoder = Optional(JsonObject);
/// assert!(decoder.decode(&bytes::Bytes::new()).unwrap().is_none());
/// assert!(decoder.decode(&bytes::Bytes::from_static(b"{}")).unwrap().is_some());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Optional<D>(pub D);

impl<D: Decode> Decode for Optional<D> {
    type Output = Option<D::Output>;

    fn decode(&self, body: &Bytes) -> Result<Self::Output, DecodeError> {
        if body.is_empty() {
            return Ok(None);
        }
        self.0.decode(body).map(Some)
    }
}
