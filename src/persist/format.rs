use crate::core::{Result, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Snapshot encoding, chosen by the suffix of the backing location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json`
    Json,
    /// `.msgpack` / `.mpk`
    MessagePack,
}

impl Format {
    pub fn from_location(location: &str) -> Result<Self> {
        if location.ends_with(".json") {
            Ok(Format::Json)
        } else if location.ends_with(".msgpack") || location.ends_with(".mpk") {
            Ok(Format::MessagePack)
        } else {
            Err(StoreError::UnsupportedFormat(location.to_string()))
        }
    }

    pub fn encode<D: Serialize>(&self, location: &str, data: &D) -> Result<Vec<u8>> {
        match self {
            Format::Json => serde_json::to_vec(data)
                .map_err(|e| StoreError::encoding(location, "failed to encode json", e)),
            Format::MessagePack => rmp_serde::to_vec_named(data)
                .map_err(|e| StoreError::encoding(location, "failed to encode msgpack", e)),
        }
    }

    pub fn decode<D: DeserializeOwned>(&self, location: &str, bytes: &[u8]) -> Result<D> {
        match self {
            Format::Json => serde_json::from_slice(bytes)
                .map_err(|e| StoreError::encoding(location, "failed to decode json", e)),
            Format::MessagePack => rmp_serde::from_slice(bytes)
                .map_err(|e| StoreError::encoding(location, "failed to decode msgpack", e)),
        }
    }
}
