//! API key storage. Validation is the caller's job.

use std::sync::Arc;

use crate::storage::{KvStore, StorageError};

pub const API_KEY_STORAGE: &str = "glassquiz_api_key";

#[derive(Clone)]
pub struct CredentialStore {
  store: Arc<dyn KvStore>,
}

impl CredentialStore {
  pub fn new(store: Arc<dyn KvStore>) -> Self {
    Self { store }
  }

  pub fn get(&self) -> Result<Option<String>, StorageError> {
    Ok(self.store.get(API_KEY_STORAGE)?.filter(|k| !k.is_empty()))
  }

  pub fn set(&self, key: &str) -> Result<(), StorageError> {
    self.store.set(API_KEY_STORAGE, key)
  }

  pub fn clear(&self) -> Result<(), StorageError> {
    self.store.remove(API_KEY_STORAGE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;

  #[test]
  fn set_get_clear() {
    let creds = CredentialStore::new(Arc::new(MemoryStore::new()));
    assert_eq!(creds.get().unwrap(), None);
    creds.set("sk-test-123456").unwrap();
    assert_eq!(creds.get().unwrap().as_deref(), Some("sk-test-123456"));
    creds.clear().unwrap();
    assert_eq!(creds.get().unwrap(), None);
  }
}
