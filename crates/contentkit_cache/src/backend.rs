//! Cache backend trait definition.

use crate::error::CacheResult;
use crate::hasher::ContentKey;

/// A keyed byte store holding one serialized record per content key.
///
/// Backends are **opaque**: they never parse what they store.
/// [`crate::CacheStore`] owns the record format and serializes access
/// per key, so backends only need to make each single call safe.
///
/// # Invariants
///
/// - `write` replaces any previous bytes for the key as a whole; a
///   concurrent `read` sees either the old or the new bytes, never a mix
/// - `read` returns `None` for a key that was never written or was removed
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::InMemoryBackend`] - For testing
/// - [`crate::FileBackend`] - For persistent caches
pub trait CacheBackend: Send + Sync {
    /// Reads the bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read(&self, key: &ContentKey) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `data` under `key`, replacing any previous bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn write(&self, key: &ContentKey, data: &[u8]) -> CacheResult<()>;

    /// Removes `key`. Returns true if something was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn remove(&self, key: &ContentKey) -> CacheResult<bool>;

    /// Lists every stored key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be enumerated.
    fn keys(&self) -> CacheResult<Vec<ContentKey>>;
}
