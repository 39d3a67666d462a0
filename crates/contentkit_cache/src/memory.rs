//! In-memory cache backend.

use crate::backend::CacheBackend;
use crate::error::CacheResult;
use crate::hasher::ContentKey;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory cache backend.
///
/// Records are lost when the backend is dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<ContentKey, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl CacheBackend for InMemoryBackend {
    fn read(&self, key: &ContentKey) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn write(&self, key: &ContentKey, data: &[u8]) -> CacheResult<()> {
        self.records.write().insert(key.clone(), data.to_vec());
        Ok(())
    }

    fn remove(&self, key: &ContentKey) -> CacheResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn keys(&self) -> CacheResult<Vec<ContentKey>> {
        Ok(self.records.read().keys().cloned().collect())
    }
}
