//! # ContentKit Cache
//!
//! Durable response cache for ContentKit.
//!
//! Every successful network response is stored as one JSON record named
//! by a content key, a SHA-256 digest of the request that produced it.
//! Records carry their capture time so callers can decide freshness, and
//! a sweep removes records older than a horizon.
//!
//! ## Design Principles
//!
//! - Backends are keyed byte stores; they do not interpret records
//! - [`CacheStore`] owns the record format, freshness and sweeping
//! - Reads and writes of the same key are serialized
//! - File writes go through a temporary file and an atomic rename
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral caches
//! - [`FileBackend`] - One `<key>.json` file per record in a directory
//!
//! ## Example
//!
//! ```rust
//! use contentkit_cache::{CacheStore, ContentHasher, InMemoryBackend, RequestEcho};
//! use serde_json::{json, Map};
//! use std::collections::BTreeMap;
//!
//! let store = CacheStore::new(InMemoryBackend::new());
//! let url = "https://cdn.example.com/v3/content_types/product/entries";
//! let key = ContentHasher::content_key(url, &Map::new(), &BTreeMap::new());
//!
//! store.put(&key, &RequestEcho::new(url), &json!({"entries": []})).unwrap();
//! let record = store.get(&key).unwrap().unwrap();
//! assert_eq!(record.response, json!({"entries": []}));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod clock;
mod error;
mod file;
mod hasher;
mod memory;
mod record;
mod store;

pub use backend::CacheBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, CacheResult};
pub use file::FileBackend;
pub use hasher::{ContentHasher, ContentKey, KEY_HEX_LEN};
pub use memory::InMemoryBackend;
pub use record::{CacheRecord, RequestEcho};
pub use store::{CacheStore, SweepReport, DEFAULT_SWEEP_HORIZON};
