//! MsgPack codec using `rmp-serde`.
//!
//! Always uses `to_vec_named`: structs serialize as maps with field names,
//! which is the shape envelopes have on the wire. [`MsgPackCodec::pack`] and
//! [`MsgPackCodec::unpack`] are the [`Value`]-typed pair the envelope layer
//! is built on.
//!
//! # Example
//!
//! ```
//! use routewire::codec::MsgPackCodec;
//! use routewire::Value;
//!
//! let value = Value::from(vec![Value::from("hi"), Value::from(u64::MAX)]);
//! let bytes = MsgPackCodec::pack(&value).unwrap();
//! assert_eq!(MsgPackCodec::unpack(&bytes).unwrap(), value);
//! ```

use std::io::Cursor;

use serde::Deserialize;

use crate::error::Result;
use crate::value::Value;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T, or if
    /// anything follows the first value.
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        let mut cursor = Cursor::new(bytes);
        let value = T::deserialize(&mut rmp_serde::Deserializer::new(&mut cursor))?;

        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(rmp_serde::decode::Error::Syntax(format!(
                "{} trailing byte(s) after value",
                bytes.len() - consumed
            ))
            .into());
        }
        Ok(value)
    }

    /// Pack a dynamic value.
    #[inline]
    pub fn pack(value: &Value) -> Result<Vec<u8>> {
        Self::encode(value)
    }

    /// Unpack bytes into a dynamic value.
    ///
    /// Fails on invalid msgpack and on maps with non-text keys.
    #[inline]
    pub fn unpack(bytes: &[u8]) -> Result<Value> {
        Self::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestStruct {
        id: u32,
        name: String,
        active: bool,
    }

    fn roundtrip(value: &Value) -> Value {
        let bytes = MsgPackCodec::pack(value).unwrap();
        MsgPackCodec::unpack(&bytes).unwrap()
    }

    #[test]
    fn test_scalars_roundtrip() {
        for value in [
            Value::Nil,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(0),
            Value::Int(-1),
            Value::Float(3.5),
            Value::Float(-0.25),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_integer_extremes_roundtrip() {
        assert!(matches!(roundtrip(&Value::Int(i64::MIN)), Value::Int(i64::MIN)));
        assert!(matches!(roundtrip(&Value::Int(i64::MAX)), Value::Int(i64::MAX)));
        assert!(matches!(
            roundtrip(&Value::UInt(u64::MAX)),
            Value::UInt(u64::MAX)
        ));
        // Small unsigned values normalize to Int.
        assert!(matches!(roundtrip(&Value::UInt(42)), Value::Int(42)));
    }

    #[test]
    fn test_text_and_binary_stay_distinct() {
        let text = Value::from("ünïcödé ☃ 日本語");
        let binary = Value::binary(vec![0xff, 0x00, 0xfe]);

        assert_eq!(roundtrip(&text), text);
        assert_eq!(roundtrip(&binary), binary);

        let text_bytes = MsgPackCodec::pack(&Value::from("ab")).unwrap();
        let bin_bytes = MsgPackCodec::pack(&Value::binary(*b"ab")).unwrap();
        assert_eq!(text_bytes[0], 0xa2, "fixstr of length 2");
        assert_eq!(bin_bytes[0], 0xc4, "bin8");
    }

    #[test]
    fn test_binary_matches_serde_bytes_encoding() {
        let data: Vec<u8> = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        let expected = MsgPackCodec::encode(&serde_bytes::Bytes::new(&data)).unwrap();
        let actual = MsgPackCodec::pack(&Value::binary(data.clone())).unwrap();
        assert_eq!(actual, expected);

        let decoded: serde_bytes::ByteBuf = MsgPackCodec::decode(&actual).unwrap();
        assert_eq!(decoded.as_ref(), &data);
    }

    #[test]
    fn test_nested_containers_roundtrip() {
        let mut inner = Map::new();
        inner.insert("key".to_string(), Value::from("value"));
        inner.insert("list".to_string(), Value::from(vec![Value::Int(1), Value::Nil]));

        let mut outer = Map::new();
        outer.insert("inner".to_string(), Value::Map(inner));
        outer.insert("empty".to_string(), Value::Array(vec![]));
        outer.insert("bytes".to_string(), Value::binary(vec![1, 2, 3]));

        let value = Value::Map(outer);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_nil_encodes_as_msgpack_nil() {
        assert_eq!(MsgPackCodec::pack(&Value::Nil).unwrap(), vec![0xc0]);
    }

    #[test]
    fn test_struct_decodes_as_map_value() {
        let test = TestStruct {
            id: 1,
            name: "x".to_string(),
            active: false,
        };

        let encoded = MsgPackCodec::encode(&test).unwrap();
        assert_eq!(encoded[0], 0x83, "Expected fixmap with 3 elements");

        let value = MsgPackCodec::unpack(&encoded).unwrap();
        assert_eq!(value.get("id"), Some(&Value::Int(1)));
        assert_eq!(value.get("name"), Some(&Value::from("x")));
        assert_eq!(value.get("active"), Some(&Value::Bool(false)));

        let back: TestStruct = MsgPackCodec::decode(&MsgPackCodec::pack(&value).unwrap()).unwrap();
        assert_eq!(back, test);
    }

    #[test]
    fn test_non_text_map_key_rejected() {
        // {1: "a"}
        let bytes = [0x81, 0x01, 0xa1, b'a'];
        assert!(MsgPackCodec::unpack(&bytes).is_err());
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        // 0xc1 is never used in msgpack.
        assert!(MsgPackCodec::unpack(&[0xc1]).is_err());
        // Truncated array.
        assert!(MsgPackCodec::unpack(&[0x92, 0x01]).is_err());
        assert!(MsgPackCodec::unpack(&[]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = MsgPackCodec::pack(&Value::Int(1)).unwrap();
        bytes.push(0x01);
        let err = MsgPackCodec::unpack(&bytes).unwrap_err();
        assert!(err.to_string().contains("trailing"), "{err}");

        let mut encoded = MsgPackCodec::encode(&"hi").unwrap();
        encoded.extend_from_slice(b"\xc1garbage");
        assert!(MsgPackCodec::decode::<String>(&encoded).is_err());
    }
}
