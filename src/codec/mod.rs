//! Codec module - msgpack serialization for envelopes.
//!
//! Codecs are marker structs with static methods rather than trait objects,
//! so there is nothing to construct or pass around.
//!
//! # Example
//!
//! ```
//! use routewire::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
