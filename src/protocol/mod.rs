//! Protocol module - envelopes, wire format, framing, and frame types.
//!
//! - Request/response envelopes over msgpack
//! - 10-byte frame header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors

pub mod envelope;
mod frame;
mod frame_buffer;
mod wire_format;

pub use envelope::{decode_request, decode_response, encode_request, encode_response, Request, Response};
pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    flags, Header, ABSOLUTE_MAX_PAYLOAD_SIZE, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
    PROTOCOL_VERSION,
};
