//! Record-level cache store.

use crate::backend::CacheBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, CacheResult};
use crate::file::FileBackend;
use crate::hasher::ContentKey;
use crate::record::{CacheRecord, RequestEcho};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records older than this are removed by [`CacheStore::sweep`] by default.
pub const DEFAULT_SWEEP_HORIZON: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records examined.
    pub scanned: usize,
    /// Records removed for being older than the horizon.
    pub removed: usize,
    /// Records removed because they could not be parsed.
    pub corrupt: usize,
}

/// Stores one JSON [`CacheRecord`] per content key.
///
/// # Concurrency
///
/// Every read, write and removal of a key runs under that key's lock, so
/// a reader never interleaves with a writer of the same key. Different
/// keys proceed in parallel. Lock entries nobody holds are pruned by
/// [`CacheStore::sweep`].
pub struct CacheStore {
    backend: Box<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    locks: Mutex<HashMap<ContentKey, Arc<Mutex<()>>>>,
}

impl CacheStore {
    /// Creates a store over `backend` using the system clock.
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            clock: Arc::new(SystemClock),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a file-backed store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> CacheResult<Self> {
        Ok(Self::new(FileBackend::open(dir)?))
    }

    /// Replaces the clock used for capture timestamps and freshness.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the current time according to the store's clock.
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    fn key_lock(&self, key: &ContentKey) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(key.clone()).or_default())
    }

    /// Writes a record for `key` captured now, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn put(&self, key: &ContentKey, echo: &RequestEcho, response: &Value) -> CacheResult<()> {
        let record = CacheRecord::new(key.clone(), self.now_millis(), echo, response.clone());
        let data = serde_json::to_vec(&record)?;

        let lock = self.key_lock(key);
        let _guard = lock.lock();
        self.backend.write(key, &data)?;
        debug!(key = %key, bytes = data.len(), "cache record written");
        Ok(())
    }

    /// Reads the record for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupted`] if the stored bytes do not parse,
    /// or an I/O error from the backend.
    pub fn get(&self, key: &ContentKey) -> CacheResult<Option<CacheRecord>> {
        let lock = self.key_lock(key);
        let guard = lock.lock();
        self.read_locked(&guard, key)
    }

    /// Removes the record for `key`. Returns true if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn remove(&self, key: &ContentKey) -> CacheResult<bool> {
        let lock = self.key_lock(key);
        let guard = lock.lock();
        self.remove_locked(&guard, key)
    }

    /// Reads and decodes `key`. The caller holds the key's guard.
    fn read_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        key: &ContentKey,
    ) -> CacheResult<Option<CacheRecord>> {
        let Some(data) = self.backend.read(key)? else {
            return Ok(None);
        };
        let mut record: CacheRecord =
            serde_json::from_slice(&data).map_err(|e| CacheError::Corrupted {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        record.key = key.clone();
        Ok(Some(record))
    }

    /// Removes `key`. The caller holds the key's guard.
    fn remove_locked(&self, _guard: &MutexGuard<'_, ()>, key: &ContentKey) -> CacheResult<bool> {
        self.backend.remove(key)
    }

    /// Returns true if `record` is no older than `max_age`.
    ///
    /// A `max_age` of zero means the record is always stale. This is the
    /// default client setting, under which cache-only and cache-first
    /// policies never consider a record fresh until a caller opts into a
    /// positive age.
    pub fn is_fresh(&self, record: &CacheRecord, max_age: Duration) -> bool {
        if max_age.is_zero() {
            return false;
        }
        let max_age = u64::try_from(max_age.as_millis()).unwrap_or(u64::MAX);
        record.age_millis(self.now_millis()) <= max_age
    }

    /// Lists every readable record. Corrupt records are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated.
    pub fn entries(&self) -> CacheResult<Vec<CacheRecord>> {
        let mut records = Vec::new();
        for key in self.backend.keys()? {
            match self.get(&key) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable cache record"),
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    /// Removes every record older than `horizon`, and every record that no
    /// longer parses.
    ///
    /// Intended to run out-of-band on a schedule, not on the request path.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be enumerated or a removal
    /// fails.
    pub fn sweep(&self, horizon: Duration) -> CacheResult<SweepReport> {
        let now = self.now_millis();
        let horizon = u64::try_from(horizon.as_millis()).unwrap_or(u64::MAX);
        let mut report = SweepReport::default();

        for key in self.backend.keys()? {
            report.scanned += 1;
            // One guard spans the read, the age check and the removal so a
            // concurrent `put` of the same key is never swept away.
            let lock = self.key_lock(&key);
            let guard = lock.lock();
            match self.read_locked(&guard, &key) {
                Ok(Some(record)) if record.age_millis(now) > horizon => {
                    if self.remove_locked(&guard, &key)? {
                        report.removed += 1;
                    }
                }
                Ok(_) => {}
                Err(CacheError::Corrupted { reason, .. }) => {
                    warn!(key = %key, %reason, "removing corrupt cache record");
                    if self.remove_locked(&guard, &key)? {
                        report.corrupt += 1;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        info!(
            scanned = report.scanned,
            removed = report.removed,
            corrupt = report.corrupt,
            "cache sweep complete"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("locked_keys", &self.locks.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hasher::ContentHasher;
    use crate::memory::InMemoryBackend;
    use serde_json::{json, Map};
    use std::collections::BTreeMap;

    const HOUR_MS: i64 = 60 * 60 * 1000;

    fn key_for(url: &str) -> ContentKey {
        ContentHasher::content_key(url, &Map::new(), &BTreeMap::new())
    }

    fn store_at(now: i64) -> (CacheStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let store = CacheStore::new(InMemoryBackend::new()).with_clock(clock.clone());
        (store, clock)
    }

    #[test]
    fn put_then_get() {
        let (store, _) = store_at(1_000);
        let key = key_for("https://a");
        let body = json!({"entries": [{"uid": "e1", "price": 12.5}]});

        store.put(&key, &RequestEcho::new("https://a"), &body).unwrap();
        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.timestamp, 1_000);
        assert_eq!(record.url, "https://a");
        assert_eq!(record.response, body);
    }

    #[test]
    fn missing_key_is_none() {
        let (store, _) = store_at(0);
        assert!(store.get(&key_for("https://nothing")).unwrap().is_none());
    }

    #[test]
    fn put_overwrites_and_restamps() {
        let (store, clock) = store_at(1_000);
        let key = key_for("https://a");
        store.put(&key, &RequestEcho::new("https://a"), &json!(1)).unwrap();
        clock.advance(5_000);
        store.put(&key, &RequestEcho::new("https://a"), &json!(2)).unwrap();

        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.response, json!(2));
        assert_eq!(record.timestamp, 6_000);
    }

    #[test]
    fn zero_max_age_is_always_stale() {
        let (store, _) = store_at(1_000);
        let key = key_for("https://a");
        store.put(&key, &RequestEcho::new("https://a"), &json!({})).unwrap();
        let record = store.get(&key).unwrap().unwrap();
        assert!(!store.is_fresh(&record, Duration::ZERO));
    }

    #[test]
    fn freshness_boundary_is_inclusive() {
        let (store, clock) = store_at(1_000);
        let key = key_for("https://a");
        store.put(&key, &RequestEcho::new("https://a"), &json!({})).unwrap();
        let record = store.get(&key).unwrap().unwrap();

        clock.advance(60_000);
        assert!(store.is_fresh(&record, Duration::from_secs(60)));
        clock.advance(1);
        assert!(!store.is_fresh(&record, Duration::from_secs(60)));
    }

    #[test]
    fn corrupt_record_is_reported() {
        let backend = InMemoryBackend::new();
        let key = key_for("https://a");
        backend.write(&key, b"{not json").unwrap();
        let store = CacheStore::new(backend);
        assert!(matches!(store.get(&key), Err(CacheError::Corrupted { .. })));
    }

    #[test]
    fn sweep_removes_old_and_corrupt_records() {
        let (store, clock) = store_at(0);
        let old = key_for("https://old");
        let young = key_for("https://young");
        store.put(&old, &RequestEcho::new("https://old"), &json!(1)).unwrap();
        clock.advance(20 * HOUR_MS);
        store.put(&young, &RequestEcho::new("https://young"), &json!(2)).unwrap();
        clock.advance(5 * HOUR_MS);

        let report = store.sweep(DEFAULT_SWEEP_HORIZON).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, 1);
        assert!(store.get(&old).unwrap().is_none());
        assert!(store.get(&young).unwrap().is_some());
    }

    #[test]
    fn entries_lists_records_sorted() {
        let (store, _) = store_at(0);
        for url in ["https://a", "https://b", "https://c"] {
            store.put(&key_for(url), &RequestEcho::new(url), &json!(url)).unwrap();
        }
        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].key < w[1].key));
    }

    #[test]
    fn sweep_prunes_idle_locks() {
        let (store, _) = store_at(0);
        store
            .put(&key_for("https://a"), &RequestEcho::new("https://a"), &json!(1))
            .unwrap();
        assert_eq!(store.locks.lock().len(), 1);
        store.sweep(DEFAULT_SWEEP_HORIZON).unwrap();
        assert!(store.locks.lock().is_empty());
    }
}
