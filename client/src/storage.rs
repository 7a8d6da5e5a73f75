//! Durable key-value storage backing the cache and the pending log.
//!
//! Values are whole JSON documents. A `set` either leaves the previous value
//! in place or replaces it completely; readers never observe a partial write.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dashmap::DashMap;

/// A persistent string-keyed store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key was never written.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Delete a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-memory store, for tests and hosts without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key inside a directory.
///
/// Writes go to a temporary file that is fsynced and renamed over the
/// target, so a crash mid-write keeps the old value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid storage key: {:?}", key),
            ));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("cached_boats").unwrap(), None);

        store.set("cached_boats", "[]").unwrap();
        assert_eq!(store.get("cached_boats").unwrap().as_deref(), Some("[]"));

        store.remove("cached_boats").unwrap();
        store.remove("cached_boats").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("berth")).unwrap();

        assert_eq!(store.get("pending_actions").unwrap(), None);
        store.set("pending_actions", r#"[{"id":"a"}]"#).unwrap();
        store.set("pending_actions", "[]").unwrap();
        assert_eq!(store.get("pending_actions").unwrap().as_deref(), Some("[]"));

        store.remove("pending_actions").unwrap();
        assert_eq!(store.get("pending_actions").unwrap(), None);
        store.remove("pending_actions").unwrap();
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::open(dir.path())
            .unwrap()
            .set("last_sync", "1706745600000")
            .unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get("last_sync").unwrap().as_deref(),
            Some("1706745600000")
        );
    }

    #[test]
    fn file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let err = store.set("../escape", "x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(store.get("").is_err());
    }
}
