//! JSON-RPC 2.0 envelope codec.
//!
//! Inbound payloads are decoded in two passes: the bytes are first parsed as
//! JSON, then the resulting value is classified as a request, notification,
//! response, or error response. Keeping the passes separate lets the
//! dispatcher tell a syntax failure (`-32700`) from a shape failure
//! (`-32600`).
//!
//! Encoding is infallible. Every outbound message is built from
//! `serde_json::Value` trees, whose maps are always string-keyed.

mod codes;
mod errors;
mod params;

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

pub use self::codes::StandardError;
pub use self::errors::EnvelopeError;
pub use self::params::{Params, ParamsError};

/// Protocol version carried in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Produced if serialising a `Value` tree ever fails.
const FALLBACK_ERROR: &[u8] =
    br#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// Correlation token of a request.
///
/// The token is opaque: it is echoed back verbatim and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestId {
    /// Numeric identifier.
    Number(Number),
    /// String identifier.
    String(String),
    /// Explicit `null`, also used when no identifier could be recovered.
    Null,
}

impl RequestId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => Some(Self::Number(number.clone())),
            Value::String(text) => Some(Self::String(text.clone())),
            Value::Null => Some(Self::Null),
            _ => None,
        }
    }

    /// Converts the identifier into its JSON form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(number) => Value::Number(number.clone()),
            Self::String(text) => Value::String(text.clone()),
            Self::Null => Value::Null,
        }
    }
}

impl Serialize for RequestId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(number) => number.serialize(serializer),
            Self::String(text) => serializer.serialize_str(text),
            Self::Null => serializer.serialize_unit(),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) => write!(formatter, "{number}"),
            Self::String(text) => formatter.write_str(text),
            Self::Null => formatter.write_str("null"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

/// A call that expects a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Correlation token echoed in the response.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Call parameters.
    pub params: Params,
}

/// A call that never receives a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Method name.
    pub method: String,
    /// Call parameters.
    pub params: Params,
}

/// A successful reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Identifier of the originating request.
    pub id: RequestId,
    /// Value returned by the handler.
    pub result: Value,
}

/// The `error` member of an error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    /// Numeric error code.
    pub code: i64,
    /// Short human-readable description; never a stack trace.
    pub message: String,
    /// Structured detail such as the failure type and traceback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Builds an error object for a reserved JSON-RPC error.
    #[must_use]
    pub fn standard(error: StandardError, data: Option<Value>) -> Self {
        Self {
            code: error.code(),
            message: error.message().to_owned(),
            data,
        }
    }
}

/// A failed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// Identifier of the originating request, or `null`.
    pub id: RequestId,
    /// The error detail.
    pub error: ErrorObject,
}

/// Any JSON-RPC 2.0 message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// A call expecting a reply.
    Request(Request),
    /// A call without a reply.
    Notification(Notification),
    /// A successful reply.
    Response(Response),
    /// A failed reply.
    ErrorResponse(ErrorResponse),
}

impl Envelope {
    /// Decodes a raw bus payload.
    ///
    /// Trailing ASCII whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Parse`] if the payload is empty or not valid
    /// JSON, and [`EnvelopeError::Invalid`] if it is JSON that does not have
    /// the shape of a JSON-RPC 2.0 message.
    pub fn decode(payload: &[u8]) -> Result<Self, EnvelopeError> {
        let trimmed = trim_trailing_whitespace(payload);
        if trimmed.is_empty() {
            return Err(EnvelopeError::parse("empty payload"));
        }
        let value: Value = serde_json::from_slice(trimmed).map_err(EnvelopeError::from_json_error)?;
        Self::from_value(value)
    }

    /// Classifies an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Invalid`] if the value is not a JSON-RPC 2.0
    /// message.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let mut object = match value {
            Value::Object(object) => object,
            Value::Array(_) => return Err(EnvelopeError::invalid("batch payloads are not supported")),
            _ => return Err(EnvelopeError::invalid("envelope must be a JSON object")),
        };

        match object.get("jsonrpc") {
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(_) => return Err(EnvelopeError::invalid("jsonrpc must be \"2.0\"")),
            None => return Err(EnvelopeError::invalid("missing jsonrpc member")),
        }

        let id = match object.get("id") {
            Some(raw) => Some(RequestId::from_value(raw).ok_or_else(|| {
                EnvelopeError::invalid("id must be a string, number, or null")
            })?),
            None => None,
        };

        if let Some(raw_method) = object.remove("method") {
            let Value::String(method) = raw_method else {
                return Err(EnvelopeError::invalid("method must be a string"));
            };
            let params = Params::from_member(object.remove("params"))?;
            return Ok(match id {
                Some(id) => Self::Request(Request { id, method, params }),
                None => Self::Notification(Notification { method, params }),
            });
        }

        let response_id =
            id.ok_or_else(|| EnvelopeError::invalid("response is missing its id"))?;
        match (object.remove("result"), object.remove("error")) {
            (Some(result), None) => Ok(Self::Response(Response {
                id: response_id,
                result,
            })),
            (None, Some(error)) => Ok(Self::ErrorResponse(ErrorResponse {
                id: response_id,
                error: decode_error_object(error)?,
            })),
            (Some(_), Some(_)) => Err(EnvelopeError::invalid(
                "response carries both result and error",
            )),
            (None, None) => Err(EnvelopeError::invalid(
                "envelope has no method, result, or error",
            )),
        }
    }

    /// Method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(request) => Some(&request.method),
            Self::Notification(notification) => Some(&notification.method),
            Self::Response(_) | Self::ErrorResponse(_) => None,
        }
    }

    /// Correlation token, absent for notifications.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(Request { id, .. })
            | Self::Response(Response { id, .. })
            | Self::ErrorResponse(ErrorResponse { id, .. }) => Some(id),
            Self::Notification(_) => None,
        }
    }

    /// Short name of the envelope variant, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Notification(_) => "notification",
            Self::Response(_) => "response",
            Self::ErrorResponse(_) => "error_response",
        }
    }
}

fn decode_error_object(value: Value) -> Result<ErrorObject, EnvelopeError> {
    let Value::Object(mut object) = value else {
        return Err(EnvelopeError::invalid("error must be an object"));
    };
    let code = object
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| EnvelopeError::invalid("error.code must be an integer"))?;
    let message = match object.remove("message") {
        Some(Value::String(message)) => message,
        _ => return Err(EnvelopeError::invalid("error.message must be a string")),
    };
    Ok(ErrorObject {
        code,
        message,
        data: object.remove("data"),
    })
}

#[derive(Serialize)]
struct WireRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
    method: &'a str,
    params: &'a Params,
}

#[derive(Serialize)]
struct WireResponse<'a> {
    jsonrpc: &'static str,
    id: &'a RequestId,
    result: &'a Value,
}

#[derive(Serialize)]
struct WireError<'a> {
    jsonrpc: &'static str,
    id: &'a RequestId,
    error: &'a ErrorObject,
}

fn to_wire<T: Serialize>(message: &T) -> Vec<u8> {
    serde_json::to_vec(message).unwrap_or_else(|_| FALLBACK_ERROR.to_vec())
}

/// Serialises a successful response.
#[must_use]
pub fn encode_response(id: &RequestId, result: &Value) -> Vec<u8> {
    to_wire(&WireResponse {
        jsonrpc: JSONRPC_VERSION,
        id,
        result,
    })
}

/// Serialises an error response.
#[must_use]
pub fn encode_error(id: &RequestId, code: i64, message: &str, data: Option<Value>) -> Vec<u8> {
    encode_error_object(
        id,
        &ErrorObject {
            code,
            message: message.to_owned(),
            data,
        },
    )
}

/// Serialises an error response from a prepared error object.
#[must_use]
pub fn encode_error_object(id: &RequestId, error: &ErrorObject) -> Vec<u8> {
    to_wire(&WireError {
        jsonrpc: JSONRPC_VERSION,
        id,
        error,
    })
}

impl Request {
    /// Builds a request.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Params) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Serialises the request.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        to_wire(&WireRequest {
            jsonrpc: JSONRPC_VERSION,
            id: Some(&self.id),
            method: &self.method,
            params: &self.params,
        })
    }
}

impl Notification {
    /// Builds a notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Serialises the notification.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        to_wire(&WireRequest {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: &self.method,
            params: &self.params,
        })
    }
}

/// Builds the `error.data` member used for framework-raised errors.
#[must_use]
pub fn error_data(exception: Option<&str>, traceback: Option<&str>) -> Value {
    let mut data = Map::new();
    data.insert(
        "exception".to_owned(),
        exception.map_or(Value::Null, |name| Value::String(name.to_owned())),
    );
    if let Some(traceback) = traceback {
        data.insert("traceback".to_owned(), Value::String(traceback.to_owned()));
    }
    Value::Object(data)
}

/// Trims trailing ASCII whitespace from a byte slice.
fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    bytes.get(..end).unwrap_or_default()
}

#[cfg(test)]
mod tests;
