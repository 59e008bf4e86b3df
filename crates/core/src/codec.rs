//! Value codecs for the byte-oriented cache.
//!
//! The cache tiers only ever see bytes. Callers pick a codec per key
//! namespace and use it on both sides of the cache.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::Error;

/// Converts typed values to and from cached bytes.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, Error>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error>;
}

/// JSON codec backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Bytes, Error> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::Codec(format!("json encode: {e}")))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Codec(format!("json decode: {e}")))
    }
}
