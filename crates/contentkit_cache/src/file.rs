//! File-based cache backend.

use crate::backend::CacheBackend;
use crate::error::CacheResult;
use crate::hasher::ContentKey;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const RECORD_EXTENSION: &str = "json";

/// A directory of `<content key>.json` files.
///
/// # Durability
///
/// Each write goes to a temporary file in the same directory which is
/// synced and then renamed over the record, so readers never observe a
/// partially written record.
///
/// # Example
///
/// ```no_run
/// use contentkit_cache::{CacheBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("cache")).unwrap();
/// println!("{} records", backend.keys().unwrap().len());
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Opens a cache directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> CacheResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &ContentKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", key.as_str(), RECORD_EXTENSION))
    }
}

impl CacheBackend for FileBackend {
    fn read(&self, key: &ContentKey) -> CacheResult<Option<Vec<u8>>> {
        match fs::read(self.record_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &ContentKey, data: &[u8]) -> CacheResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.record_path(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &ContentKey) -> CacheResult<bool> {
        match fs::remove_file(self.record_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> CacheResult<Vec<ContentKey>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            // Foreign files in the directory are left alone.
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| ContentKey::parse(s).ok())
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(c: char) -> ContentKey {
        ContentKey::parse(&c.to_string().repeat(64)).unwrap()
    }

    #[test]
    fn file_open_creates_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache");
        let backend = FileBackend::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(backend.dir(), path);
    }

    #[test]
    fn file_write_and_read() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        assert_eq!(backend.read(&key('a')).unwrap(), None);
        backend.write(&key('a'), b"hello").unwrap();
        assert_eq!(backend.read(&key('a')).unwrap().unwrap(), b"hello");
        assert!(dir.path().join(format!("{}.json", "a".repeat(64))).exists());
    }

    #[test]
    fn file_overwrite_replaces_whole_record() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.write(&key('a'), b"a much longer first record").unwrap();
        backend.write(&key('a'), b"short").unwrap();
        assert_eq!(backend.read(&key('a')).unwrap().unwrap(), b"short");
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.write(&key('b'), b"persistent").unwrap();
        }
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.read(&key('b')).unwrap().unwrap(), b"persistent");
    }

    #[test]
    fn file_keys_skip_foreign_files() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.write(&key('c'), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignore").unwrap();
        std::fs::write(dir.path().join("short.json"), b"ignore").unwrap();

        assert_eq!(backend.keys().unwrap(), vec![key('c')]);
    }

    #[test]
    fn file_remove() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.write(&key('d'), b"x").unwrap();
        assert!(backend.remove(&key('d')).unwrap());
        assert!(!backend.remove(&key('d')).unwrap());
        assert_eq!(backend.read(&key('d')).unwrap(), None);
    }
}
