//! Client-side key/value stores.
//!
//! Two scopes exist: a session scope (cache entries, last active tag) and a
//! persistent scope (the bearer token). Either may live in memory or in a JSON
//! file. Both sit behind [`KeyValueStore`] so the cache and credentials never
//! depend on the concrete medium.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::error::StorageError;
use crate::util::lock;

const SOURCE: &str = "infra::storage";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// Session-scoped store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock::read(&self.entries, SOURCE, "memory.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock::read(&self.entries, SOURCE, "memory.get")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock::write(&self.entries, SOURCE, "memory.set").insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock::write(&self.entries, SOURCE, "memory.remove").remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        lock::read(&self.entries, SOURCE, "memory.keys")
            .keys()
            .cloned()
            .collect()
    }
}

/// Store persisted as a single JSON object on disk.
///
/// The file may be shared by several processes. Every call re-reads it under
/// an advisory lock on a `.lock` sibling, and a mutation only changes the key
/// it names before the document is rewritten through a temporary sibling.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Open the store, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");

        let store = Self {
            path,
            lock_path: PathBuf::from(lock_path),
        };
        let entries = store.load()?;
        debug!(path = %store.path.display(), entries = entries.len(), "Opened file store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// The returned handle holds the lock until it is dropped.
    fn lock(&self, exclusive: bool) -> Result<File, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|err| StorageError::io(&self.lock_path, err))?;
        let locked = if exclusive {
            file.lock()
        } else {
            file.lock_shared()
        };
        locked.map_err(|err| StorageError::io(&self.lock_path, err))?;
        Ok(file)
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(StorageError::io(&self.path, err)),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.dir().exists() {
            return Ok(BTreeMap::new());
        }
        let _lock = self.lock(false)?;
        self.read_entries()
    }

    /// Apply `change` to the current contents; it returns whether to write.
    fn update<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|err| StorageError::io(dir, err))?;

        let _lock = self.lock(true)?;
        let mut entries = self.read_entries()?;
        if !change(&mut entries) {
            return Ok(());
        }

        let mut tmp = NamedTempFile::new_in(dir).map_err(|err| StorageError::io(dir, err))?;
        serde_json::to_writer_pretty(&mut tmp, &entries)?;
        tmp.flush()
            .map_err(|err| StorageError::io(tmp.path(), err))?;
        tmp.persist(&self.path)
            .map_err(|err| StorageError::io(&self.path, err.error))?;
        Ok(())
    }

    fn snapshot(&self, op: &'static str) -> BTreeMap<String, String> {
        self.load().unwrap_or_else(|err| {
            warn!(path = %self.path.display(), op, error = %err, "File store unreadable");
            BTreeMap::new()
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.snapshot("get").remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.snapshot("keys").into_keys().collect()
    }
}

/// File-backed store when a path is configured, in-memory otherwise.
pub fn open_store(path: Option<&Path>) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    Ok(match path {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    })
}
