//! JSON encoding of persisted lock lists (requires the `serde` feature).
//!
//! Enable with:
//! ```toml
//! [dependencies]
//! anyfs-brlock = { version = "0.1", features = ["serde"] }
//! ```

use crate::{LockList, StoreError};

impl LockList {
    /// Encode the list as it is persisted in a byte-oriented store.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Serialization`] if encoding fails
    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode a list previously written by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// - [`StoreError::Deserialization`] if the bytes are not a valid list
    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialization(e.to_string()))
    }
}
