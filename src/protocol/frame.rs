//! Frame struct with typed accessors.
//!
//! # Example
//!
//! ```
//! use routewire::protocol::{Frame, Header};
//! use bytes::Bytes;
//!
//! let header = Header::reply(42, 5);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! assert_eq!(frame.sequence(), 42);
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::Bytes;

use super::wire_format::{Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame, keeping only the payload.
    #[inline]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    #[inline]
    pub fn sequence(&self) -> u32 {
        self.header.sequence
    }

    #[inline]
    pub fn is_reply(&self) -> bool {
        self.header.is_reply()
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use routewire::protocol::{build_frame, Header};
///
/// let header = Header::request(1, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), 10 + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
