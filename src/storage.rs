//! Narrow key-value storage used for the credential and the history log.
//!
//! `MemoryStore` backs tests and ephemeral runs; `FileStore` keeps one JSON
//! document per key in a data directory.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, instrument};

#[derive(Debug)]
pub enum StorageError {
  Io(std::io::Error),
  Serde(serde_json::Error),
  /// The write would exceed the store's size limit.
  QuotaExceeded { key: String, bytes: usize },
}

impl std::error::Error for StorageError {}

impl fmt::Display for StorageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StorageError::Io(e) => write!(f, "IO error: {}", e),
      StorageError::Serde(e) => write!(f, "Serialization error: {}", e),
      StorageError::QuotaExceeded { key, bytes } => write!(f, "quota exceeded writing {} bytes to '{}'", bytes, key),
    }
  }
}

impl From<std::io::Error> for StorageError {
  fn from(err: std::io::Error) -> Self {
    StorageError::Io(err)
  }
}

impl From<serde_json::Error> for StorageError {
  fn from(err: serde_json::Error) -> Self {
    StorageError::Serde(err)
  }
}

pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
  fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Default)]
pub struct MemoryStore {
  entries: RwLock<HashMap<String, String>>,
  quota: Option<usize>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store that rejects any write pushing the total size past `bytes`.
  pub fn with_quota(bytes: usize) -> Self {
    Self { entries: RwLock::default(), quota: Some(bytes) }
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    if let Some(quota) = self.quota {
      let others: usize = entries.iter().filter(|(k, _)| k.as_str() != key).map(|(k, v)| k.len() + v.len()).sum();
      let bytes = key.len() + value.len();
      if others + bytes > quota {
        return Err(StorageError::QuotaExceeded { key: key.to_string(), bytes });
      }
    }
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
    entries.remove(key);
    Ok(())
  }
}

/// One file per key under `dir`. Writes go to a temporary file that is then
/// renamed over the target, so a reader never sees a half-written value.
pub struct FileStore {
  dir: PathBuf,
}

impl FileStore {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
    let dir = dir.as_ref().to_path_buf();
    fs::create_dir_all(&dir)?;
    Ok(Self { dir })
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let safe: String = key
      .chars()
      .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
      .collect();
    self.dir.join(format!("{}.json", safe))
  }
}

impl KvStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let path = self.path_for(key);
    match fs::read_to_string(&path) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  #[instrument(level = "debug", skip(self, value), fields(%key, bytes = value.len()))]
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let path = self.path_for(key);
    let temp_path = path.with_extension("tmp.json");
    let mut temp_file = fs::File::create(&temp_path)?;
    temp_file.write_all(value.as_bytes())?;
    temp_file.sync_all()?;
    fs::rename(&temp_path, &path)?;
    debug!(target: "glassquiz", path = %path.display(), "Stored value");
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    match fs::remove_file(self.path_for(key)) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
