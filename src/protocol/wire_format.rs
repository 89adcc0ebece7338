//! Wire format encoding and decoding.
//!
//! Every envelope travels as one frame with a 10-byte header:
//! ```text
//! ┌─────────┬───────┬──────────┬──────────┐
//! │ Version │ Flags │ Sequence │ Length   │
//! │ 1 byte  │ 1 byte│ 4 bytes  │ 4 bytes  │
//! │         │       │ uint32 BE│ uint32 BE│
//! └─────────┴───────┴──────────┴──────────┘
//! ```
//!
//! The sequence number is chosen by the requesting side and echoed in the
//! reply, which is how a retrying client tells a fresh reply from a stale one.
//!
//! All multi-byte integers are Big Endian.

use crate::error::{Error, Result};

/// Header size in bytes (fixed, exactly 10).
pub const HEADER_SIZE: usize = 10;

/// Current frame format version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default maximum payload size (64 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Absolute maximum payload size (~2 GB, max i32).
pub const ABSOLUTE_MAX_PAYLOAD_SIZE: u32 = 2_147_483_647;

/// Flag constants for the protocol.
pub mod flags {
    /// Message type: reply (1) or request (0).
    pub const IS_REPLY: u8 = 0b0000_0001;

    /// Reserved bits mask (bits 1-7).
    pub const RESERVED_MASK: u8 = 0b1111_1110;

    /// Request flags.
    pub const REQUEST: u8 = 0;
    /// Reply flags.
    pub const REPLY: u8 = IS_REPLY;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Frame format version.
    pub version: u8,
    /// Flags byte (see `flags` module).
    pub flags: u8,
    /// Request sequence number, echoed by the reply.
    pub sequence: u32,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header for the current protocol version.
    pub fn new(flags: u8, sequence: u32, payload_length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags,
            sequence,
            payload_length,
        }
    }

    /// Header for a request frame.
    #[inline]
    pub fn request(sequence: u32, payload_length: u32) -> Self {
        Self::new(flags::REQUEST, sequence, payload_length)
    }

    /// Header for a reply frame.
    #[inline]
    pub fn reply(sequence: u32, payload_length: u32) -> Self {
        Self::new(flags::REPLY, sequence, payload_length)
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use routewire::protocol::Header;
    ///
    /// let header = Header::reply(42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 10);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (10 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0] = self.version;
        buf[1] = self.flags;
        buf[2..6].copy_from_slice(&self.sequence.to_be_bytes());
        buf[6..10].copy_from_slice(&self.payload_length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use routewire::protocol::Header;
    ///
    /// let bytes = [1, 0x01, 0, 0, 0, 42, 0, 0, 0, 100];
    /// let header = Header::decode(&bytes).unwrap();
    /// assert!(header.is_reply());
    /// assert_eq!(header.sequence, 42);
    /// assert_eq!(header.payload_length, 100);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            version: buf[0],
            flags: buf[1],
            sequence: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
            payload_length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Version matches [`PROTOCOL_VERSION`]
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(Error::Protocol(format!(
                "Unsupported frame version {} (expected {})",
                self.version, PROTOCOL_VERSION
            )));
        }

        if self.payload_length > max_payload_size {
            return Err(Error::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(Error::Protocol("Reserved flag bits must be 0".to_string()));
        }

        Ok(())
    }

    /// Check if this is a reply.
    #[inline]
    pub fn is_reply(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_REPLY)
    }
}
