//! Durable key-value persistence.
//!
//! Every component above this layer reads its state once at startup and then
//! writes through [`PersistentStore::commit`] after each mutation. A commit is
//! all-or-nothing: either every change in it is durable, or none is.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "builds": [ ... ],
//!     "selectedBuildPath": "/games/Foo",
//!     "session": { "email": "...", "password": "..." },
//!     "eor": false
//!   }
//! }
//! ```
//!
//! # Defensive Loading
//!
//! A missing file, an empty file, corrupt JSON, or an unknown version all load
//! as an empty store. The latter three log a warning; the next commit rewrites
//! the file.
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write never leaves a truncated file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StoreError;

const STORE_VERSION: u32 = 1;

/// Key holding the build entry list.
pub const KEY_BUILDS: &str = "builds";
/// Key holding the selected build path.
pub const KEY_SELECTED_PATH: &str = "selectedBuildPath";
/// Key holding the credential pair.
pub const KEY_SESSION: &str = "session";
/// Key holding the EOR toggle.
pub const KEY_EOR: &str = "eor";

/// One change inside a commit: `Some` sets the key, `None` removes it.
pub type Change<'a> = (&'a str, Option<Value>);

/// Durable key-value layer shared by the registry and the session store.
pub trait PersistentStore: Send + Sync {
    /// Reads a key. Missing keys are `None`, not errors.
    fn get(&self, key: &str) -> Option<Value>;

    /// Applies all changes durably, or none of them.
    fn commit(&self, changes: Vec<Change<'_>>) -> Result<(), StoreError>;

    /// Removes every key.
    fn clear(&self) -> Result<(), StoreError>;

    /// Returns true when the store holds no keys.
    fn is_empty(&self) -> bool;

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.commit(vec![(key, Some(value))])
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.commit(vec![(key, None)])
    }
}

fn apply(entries: &mut BTreeMap<String, Value>, changes: Vec<Change<'_>>) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value);
            }
            None => {
                entries.remove(key);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File-backed store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

/// JSON document on disk, cached in memory.
///
/// Commits are serialised behind a mutex; the cache is only updated after the
/// new document has been renamed into place.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let entries = Self::read_entries(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> Result<BTreeMap<String, Value>, StoreError> {
        let content = match fs_err::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(source) => {
                return Err(StoreError::Io {
                    context: "reading launcher store".to_string(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            tracing::warn!(path = %path.display(), "Empty store file, starting empty");
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == STORE_VERSION => Ok(file.entries),
            Ok(file) => {
                tracing::warn!(
                    path = %path.display(),
                    version = file.version,
                    expected = STORE_VERSION,
                    "Unsupported store version, starting empty"
                );
                Ok(BTreeMap::new())
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Corrupt store file, starting empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let file = StoreFile {
            version: STORE_VERSION,
            entries: entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| StoreError::Json {
            context: "serializing launcher store".to_string(),
            source,
        })?;

        let io_err = |context: &str| {
            let context = context.to_string();
            move |source: std::io::Error| StoreError::Io { context, source }
        };

        let parent_dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs_err::create_dir_all(parent_dir).map_err(io_err("creating store directory"))?;

        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(io_err("creating temp store file"))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(io_err("writing temp store file"))?;
        temp_file
            .flush()
            .map_err(io_err("flushing temp store file"))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| StoreError::Io {
                context: "replacing store file".to_string(),
                source: err.error,
            })?;
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).cloned()
    }

    fn commit(&self, changes: Vec<Change<'_>>) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = entries.clone();
        apply(&mut next, changes);
        self.write_entries(&next)?;
        *entries = next;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = BTreeMap::new();
        self.write_entries(&next)?;
        *entries = next;
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory store
// ═══════════════════════════════════════════════════════════════════════════════

/// Volatile store for tests and previews.
///
/// `fail_writes(true)` makes every subsequent commit fail without touching
/// the contents, which lets tests check that callers roll nothing forward.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io {
                context: "writing memory store".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "writes disabled"),
            });
        }
        Ok(())
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn commit(&self, changes: Vec<Change<'_>>) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut entries, changes);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check_writable()?;
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}
