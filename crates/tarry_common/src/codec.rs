//! Binary codec for hashing and persistence.
//!
//! Values are encoded with `bincode` (standard configuration) and persisted
//! objects are additionally zlib-compressed. The encoding is the input to value
//! hashing, so it must be deterministic: equal values always produce equal bytes.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors produced while encoding, decoding or (de)compressing data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A value could not be serialized.
    #[error("failed to encode value: {reason}")]
    Encode {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Bytes could not be deserialized into the requested type.
    #[error("failed to decode value: {reason}")]
    Decode {
        /// Description of the deserialization failure.
        reason: String,
    },

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}

/// Serializes a value into its canonical byte representation.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let config = bincode::config::standard();
    bincode::serde::encode_to_vec(value, config).map_err(encode_failed)
}

/// Deserializes a value previously produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let config = bincode::config::standard();
    let (value, _) = bincode::serde::decode_from_slice(bytes, config).map_err(decode_failed)?;
    Ok(value)
}

fn encode_failed(e: bincode::error::EncodeError) -> CodecError {
    CodecError::Encode {
        reason: e.to_string(),
    }
}

fn decode_failed(e: bincode::error::DecodeError) -> CodecError {
    CodecError::Decode {
        reason: e.to_string(),
    }
}

/// Compresses bytes with zlib.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let buffer = Vec::with_capacity(data.len() / 2);
    let mut encoder = ZlibEncoder::new(buffer, Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompresses bytes produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentHash, Value};
    use std::collections::BTreeMap;

    #[test]
    fn encode_decode_value() {
        let mut map = BTreeMap::new();
        map.insert("n".to_string(), Value::Int(7));
        let xs = Value::List(vec![Value::Float(0.5), Value::Unit]);
        map.insert("xs".to_string(), xs);
        let value = Value::Map(map);

        let bytes = encode(&value).unwrap();
        let back: Value = decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn encoding_is_deterministic() {
        let pair = (ContentHash::from_bytes(b"code"), Value::from("x"));
        let a = encode(&pair).unwrap();
        let b = encode(&pair.clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_variants_encode_differently() {
        let int = encode(&Value::Int(1)).unwrap();
        assert_ne!(int, encode(&Value::Bool(true)).unwrap());
    }

    #[test]
    fn decode_garbage_fails() {
        let result: Result<Value, _> = decode(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn compress_decompress() {
        let data: Vec<u8> = (0..4096).map(|i| (i % 7) as u8).collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn decompress_garbage_fails() {
        assert!(decompress(b"definitely not zlib").is_err());
    }
}
