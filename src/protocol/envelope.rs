//! Request and response envelopes.
//!
//! ```text
//! request   { i: id, r: route, m: method, a: [args], k: {kwargs}, ...extensions }
//! success   { r: value }
//! failure   { e: kind, e_msg: message }
//! ```
//!
//! `i` and `m` are required in a request. `r`, `a` and `k` may be absent or
//! nil and then default to `""`, `[]` and `{}`. Any other top-level request key
//! is kept in [`Request::extensions`] and written back out on encode, so a host
//! can carry cross-cutting data (an auth token under `t`, say) without this
//! layer knowing about it.
//!
//! A response carries exactly one of `r` or `e`.

use crate::codec::MsgPackCodec;
use crate::error::{Error, Result};
use crate::fault::Fault;
use crate::registry::Params;
use crate::value::{Map, Value};

/// Envelope key for the request id.
pub const KEY_ID: &str = "i";
/// Envelope key for the route path in requests and the result in responses.
pub const KEY_ROUTE: &str = "r";
/// Envelope key for the method name.
pub const KEY_METHOD: &str = "m";
/// Envelope key for positional arguments.
pub const KEY_ARGS: &str = "a";
/// Envelope key for keyword arguments.
pub const KEY_KWARGS: &str = "k";
/// Envelope key for the result of a successful call.
pub const KEY_RESULT: &str = "r";
/// Envelope key for the error kind.
pub const KEY_ERROR: &str = "e";
/// Envelope key for the error message.
pub const KEY_ERROR_MESSAGE: &str = "e_msg";

/// A decoded request envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Request {
    /// Caller-generated correlation id.
    pub id: String,
    /// Dot-separated route path; `""` is the root.
    pub route: String,
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map,
    /// Unrecognized top-level keys, preserved verbatim.
    pub extensions: Map,
}

impl Request {
    pub fn new(id: impl Into<String>, route: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            route: route.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Attach an extension field.
    ///
    /// Keys that collide with envelope keys are ignored on encode.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Borrowed view of the arguments for binding.
    pub fn params(&self) -> Params<'_> {
        Params::new(&self.args, &self.kwargs)
    }

    /// Map form of the envelope.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.extensions {
            if !is_request_key(key) {
                map.insert(key.clone(), value.clone());
            }
        }
        map.insert(KEY_ID.to_string(), Value::from(self.id.as_str()));
        map.insert(KEY_ROUTE.to_string(), Value::from(self.route.as_str()));
        map.insert(KEY_METHOD.to_string(), Value::from(self.method.as_str()));
        map.insert(KEY_ARGS.to_string(), Value::Array(self.args.clone()));
        map.insert(KEY_KWARGS.to_string(), Value::Map(self.kwargs.clone()));
        Value::Map(map)
    }

    /// Parse the map form of a request.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Map(map) => map,
            other => {
                return Err(malformed(format!(
                    "request must be a map, got {}",
                    other.type_name()
                )))
            }
        };

        let id = match map.remove(KEY_ID) {
            Some(Value::String(id)) => id,
            Some(other) => {
                return Err(malformed(format!(
                    "request id must be a string, got {}",
                    other.type_name()
                )))
            }
            None => return Err(malformed("request is missing the 'i' key")),
        };

        let method = match map.remove(KEY_METHOD) {
            Some(Value::String(method)) => method,
            Some(other) => {
                return Err(malformed(format!(
                    "method must be a string, got {}",
                    other.type_name()
                )))
            }
            None => return Err(malformed("request is missing the 'm' key")),
        };

        let route = match map.remove(KEY_ROUTE) {
            None | Some(Value::Nil) => String::new(),
            Some(Value::String(route)) => route,
            Some(other) => {
                return Err(malformed(format!(
                    "route must be a string, got {}",
                    other.type_name()
                )))
            }
        };

        let args = match map.remove(KEY_ARGS) {
            None | Some(Value::Nil) => Vec::new(),
            Some(Value::Array(args)) => args,
            Some(other) => {
                return Err(malformed(format!(
                    "args must be an array, got {}",
                    other.type_name()
                )))
            }
        };

        let kwargs = match map.remove(KEY_KWARGS) {
            None | Some(Value::Nil) => Map::new(),
            Some(Value::Map(kwargs)) => kwargs,
            Some(other) => {
                return Err(malformed(format!(
                    "kwargs must be a map, got {}",
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            id,
            route,
            method,
            args,
            kwargs,
            extensions: map,
        })
    }
}

/// A response envelope: exactly one of success or failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Value),
    Failure(Fault),
}

impl Response {
    pub fn ok(value: impl Into<Value>) -> Self {
        Response::Success(value.into())
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Failure(Fault::new(kind, message))
    }

    /// Unwrap into the call result.
    pub fn into_result(self) -> std::result::Result<Value, Fault> {
        match self {
            Response::Success(value) => Ok(value),
            Response::Failure(fault) => Err(fault),
        }
    }

    /// Map form of the envelope.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Response::Success(value) => {
                map.insert(KEY_RESULT.to_string(), value.clone());
            }
            Response::Failure(fault) => {
                map.insert(KEY_ERROR.to_string(), Value::from(fault.kind()));
                map.insert(KEY_ERROR_MESSAGE.to_string(), Value::from(fault.message()));
            }
        }
        Value::Map(map)
    }

    /// Parse the map form of a response.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = match value {
            Value::Map(map) => map,
            other => {
                return Err(malformed(format!(
                    "response must be a map, got {}",
                    other.type_name()
                )))
            }
        };

        let result = map.remove(KEY_RESULT);
        let kind = map.remove(KEY_ERROR);

        match (result, kind) {
            (Some(_), Some(_)) => Err(malformed("response carries both 'r' and 'e'")),
            (None, None) => Err(malformed("response carries neither 'r' nor 'e'")),
            (Some(value), None) => Ok(Response::Success(value)),
            (None, Some(Value::String(kind))) => {
                let message = match map.remove(KEY_ERROR_MESSAGE) {
                    None | Some(Value::Nil) => String::new(),
                    Some(Value::String(message)) => message,
                    Some(other) => {
                        return Err(malformed(format!(
                            "error message must be a string, got {}",
                            other.type_name()
                        )))
                    }
                };
                Ok(Response::Failure(Fault::new(kind, message)))
            }
            (None, Some(other)) => Err(malformed(format!(
                "error kind must be a string, got {}",
                other.type_name()
            ))),
        }
    }
}

impl From<std::result::Result<Value, Fault>> for Response {
    fn from(result: std::result::Result<Value, Fault>) -> Self {
        match result {
            Ok(value) => Response::Success(value),
            Err(fault) => Response::Failure(fault),
        }
    }
}

/// Encode a request envelope to bytes.
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    MsgPackCodec::pack(&request.to_value())
}

/// Decode a request envelope.
///
/// # Errors
///
/// [`Error::MalformedEnvelope`] when the bytes are not msgpack, not a map, or
/// lack a well-formed `i` or `m`.
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    Request::from_value(unpack_envelope(bytes)?)
}

/// Encode a response envelope to bytes.
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    MsgPackCodec::pack(&response.to_value())
}

/// Decode a response envelope.
///
/// # Errors
///
/// [`Error::MalformedEnvelope`] when the bytes are not msgpack, or the map
/// carries both or neither of `r` and `e`.
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    Response::from_value(unpack_envelope(bytes)?)
}

/// Unpack raw bytes, reporting codec failures as malformed envelopes.
pub fn unpack_envelope(bytes: &[u8]) -> Result<Value> {
    MsgPackCodec::unpack(bytes).map_err(|e| malformed(e.to_string()))
}

fn is_request_key(key: &str) -> bool {
    matches!(key, KEY_ID | KEY_ROUTE | KEY_METHOD | KEY_ARGS | KEY_KWARGS)
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedEnvelope(message.into())
}
