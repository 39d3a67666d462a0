//! On-disk record format.

use crate::hasher::ContentKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The request a record was captured from, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEcho {
    /// Fully resolved request URL.
    pub url: String,
    /// Outgoing parameter document.
    pub params: Map<String, Value>,
    /// Merged request headers.
    pub headers: BTreeMap<String, String>,
    /// Content type uid the request targeted, if any.
    pub class_uid: Option<String>,
}

impl RequestEcho {
    /// Creates an echo for `url` with no parameters or headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// One cached response.
///
/// Serialized as `{url, timestamp, params, response, classUID, header}`.
/// The content key is the record's name in the backend and is not part
/// of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Content key the record is stored under.
    #[serde(skip)]
    pub key: ContentKey,
    /// Capture time in UTC epoch milliseconds.
    pub timestamp: i64,
    /// Request URL.
    pub url: String,
    /// Request parameters.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Request headers.
    #[serde(rename = "header", default)]
    pub headers: BTreeMap<String, String>,
    /// Content type uid, if the request targeted one.
    #[serde(rename = "classUID", default, skip_serializing_if = "Option::is_none")]
    pub class_uid: Option<String>,
    /// Response body exactly as received.
    pub response: Value,
}

impl CacheRecord {
    /// Builds a record captured at `timestamp`.
    pub fn new(key: ContentKey, timestamp: i64, echo: &RequestEcho, response: Value) -> Self {
        Self {
            key,
            timestamp,
            url: echo.url.clone(),
            params: echo.params.clone(),
            headers: echo.headers.clone(),
            class_uid: echo.class_uid.clone(),
            response,
        }
    }

    /// Age of the record at `now_millis`. Never negative.
    pub fn age_millis(&self, now_millis: i64) -> u64 {
        u64::try_from(now_millis.saturating_sub(self.timestamp)).unwrap_or(0)
    }
}
