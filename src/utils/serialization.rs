// src/utils/serialization.rs
//! Serialization utilities for the offline verifier.
//!
//! Provides:
//! - JSON encoding of records persisted as opaque blobs in the keyed store
//! - base64url decoding of compact token segments
//! - Lenient claim readers used by the token header/payload records

use crate::errors::StoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// Serializes a value to a JSON byte blob for the keyed store.
///
/// # Arguments
/// * `data` - The value to serialize (must implement `Serialize`)
///
/// # Returns
/// - `Ok(Vec<u8>)` with the JSON representation on success
/// - `Err(StoreError::Encode)` if serialization fails
pub fn to_blob<T: Serialize + ?Sized>(data: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(data).map_err(|e| StoreError::Encode(e.to_string()))
}

/// Deserializes a value from a JSON byte blob read from the keyed store.
///
/// # Arguments
/// * `data` - Blob previously written by [`to_blob`]
///
/// # Returns
/// - `Ok(T)` with the deserialized value on success
/// - `Err(StoreError::Decode)` if the blob is not valid JSON for `T`
pub fn from_blob<T: DeserializeOwned>(data: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(data).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Decodes one base64url token segment.
///
/// Accepts segments with or without trailing `=` padding.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::decode_config(segment.trim_end_matches('='), base64::URL_SAFE_NO_PAD)
}

/// Reads a claim that must be a JSON string; any other type yields `None`.
pub fn string_claim<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Reads a claim that must be a JSON number; any other type yields `None`.
///
/// The number is kept as decoded so integer dates stay exact.
pub fn numeric_claim<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(n),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_round_trip_preserves_order() {
        let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let blob = to_blob(&items).unwrap();
        let back: Vec<String> = from_blob(&blob).unwrap();
        assert_eq!(back, items);
    }

    #[test]
    fn test_corrupt_blob_is_decode_error() {
        let res: Result<Vec<String>, _> = from_blob(b"{not json");
        assert!(matches!(res, Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_decode_segment_tolerates_padding() {
        // "{}" encodes to "e30" unpadded, "e30=" padded
        assert_eq!(decode_segment("e30").unwrap(), b"{}");
        assert_eq!(decode_segment("e30=").unwrap(), b"{}");
        assert!(decode_segment("e3+/").is_err());
    }
}
