//! Content keys for cache records.

use crate::error::{CacheError, CacheResult};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Length of a content key in hex characters (SHA-256).
pub const KEY_HEX_LEN: usize = 64;

/// A content key: the lowercase hex SHA-256 digest of a request shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentKey(String);

impl ContentKey {
    /// Parses a key from its hex form.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] unless `hex` is exactly
    /// [`KEY_HEX_LEN`] lowercase hex digits.
    pub fn parse(hex: &str) -> CacheResult<Self> {
        let valid = hex.len() == KEY_HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(CacheError::InvalidKey(hex.to_string()));
        }
        Ok(Self(hex.to_string()))
    }

    /// Returns the hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives content keys from requests.
///
/// The digest covers, in order and newline-separated:
/// 1. the fully resolved request URL,
/// 2. the parameter document serialized as compact JSON,
/// 3. the merged header map serialized as compact JSON with sorted keys.
///
/// Header order never affects the key. Any header value does, so records
/// are scoped per credential and header combination. SHA-256 is the only
/// digest used; records written under another scheme are never looked up
/// and age out through the sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Computes the content key for a request.
    pub fn content_key(
        url: &str,
        params: &Map<String, Value>,
        headers: &BTreeMap<String, String>,
    ) -> ContentKey {
        let params = Value::Object(params.clone()).to_string();
        let headers = Value::Object(
            headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
        .to_string();

        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(params.as_bytes());
        hasher.update(b"\n");
        hasher.update(headers.as_bytes());
        ContentKey(hex::encode(hasher.finalize()))
    }
}
