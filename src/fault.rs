//! Error values that travel inside response envelopes.
//!
//! A [`Fault`] is what every server-side failure turns into before it reaches
//! the wire: a kind name plus a human-readable message. The kind names follow
//! the conventions callers already match on (`KeyError`, `TypeError`, ...).

use std::fmt;

use crate::registry::RegistryError;

/// Well-known fault kinds.
pub mod kind {
    /// Route or method lookup failed.
    pub const KEY_ERROR: &str = "KeyError";
    /// Arguments did not bind to the method's parameters.
    pub const TYPE_ERROR: &str = "TypeError";
    /// An argument had the right type but an unacceptable value.
    pub const VALUE_ERROR: &str = "ValueError";
    /// Division or modulo by zero.
    pub const ZERO_DIVISION_ERROR: &str = "ZeroDivisionError";
    /// A method panicked or failed for an unclassified reason.
    pub const RUNTIME_ERROR: &str = "RuntimeError";
    /// The request bytes were not a valid envelope.
    pub const PROTOCOL_ERROR: &str = "ProtocolError";
}

/// A remote error: kind name and message.
///
/// Displays as `"kind: message"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    kind: String,
    message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn key_error(message: impl Into<String>) -> Self {
        Self::new(kind::KEY_ERROR, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(kind::TYPE_ERROR, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(kind::VALUE_ERROR, message)
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(kind::ZERO_DIVISION_ERROR, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(kind::RUNTIME_ERROR, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(kind::PROTOCOL_ERROR, message)
    }

    /// The error kind name, e.g. `"KeyError"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Fault {}

impl From<RegistryError> for Fault {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NoSuchRoute(_) | RegistryError::NoSuchMethod(_) => {
                Fault::key_error(err.to_string())
            }
            _ => Fault::value_error(err.to_string()),
        }
    }
}
