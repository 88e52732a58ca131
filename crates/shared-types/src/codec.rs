//! # Wire Codec
//!
//! Commands, results and queries cross the replication boundary as
//! `[version:u8 ‖ bincode(value)]`. bincode's fixed layout keeps the bytes
//! identical on every replica.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::CodecError;

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 1;

/// Encode a value with the leading version byte.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(value).map_err(|e| CodecError::Serialization(e.to_string()))?;
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a value, checking the version byte.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (&version, body) = bytes.split_first().ok_or(CodecError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(CodecError::UnsupportedVersion {
            received: version,
            supported: PROTOCOL_VERSION,
        });
    }
    bincode::deserialize(body).map_err(|e| CodecError::Serialization(e.to_string()))
}
