//! Error types for routewire.

use thiserror::Error;

use crate::fault::Fault;
use crate::registry::RegistryError;

/// Main error type for all routewire operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Frame-level protocol violation (bad version, reserved flags, oversize payload).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Bytes decoded, but not into a valid request or response envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Registration or lookup failure in the method registry.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The server answered with an error envelope.
    #[error("Remote error: {0}")]
    Remote(Fault),

    /// The lazy client exhausted its attempts without a reply.
    #[error("Server unavailable after {attempts} attempt(s)")]
    ServerUnavailable { attempts: u32 },

    /// Endpoint string could not be parsed or is unsupported on this platform.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request/reply alternation violated on a socket.
    #[error("Socket state error: {0}")]
    SocketState(&'static str),
}

impl Error {
    /// True when the error came back from the server rather than from this process.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote(_))
    }

    /// The remote fault, if this is a remote error.
    pub fn remote(&self) -> Option<&Fault> {
        match self {
            Error::Remote(fault) => Some(fault),
            _ => None,
        }
    }

    /// Transport failures a retrying client may recover from by reconnecting.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ConnectionClosed | Error::Protocol(_))
    }
}

/// Result type alias using routewire's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
