//! Cache store backends for encoded action sets.
//!
//! # Storage Layout
//!
//! ```text
//! {cache_dir}/actions/
//! └── <key>.json          # CacheEntry: version + hex action bytes per kind
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::codec::EncodedAction;
use crate::config::IsolationConfig;
use crate::consts::CACHE_ENTRY_VERSION;
use crate::isolate::EncodedActionSet;

use super::types::{CacheEntry, CacheKey, CacheStoreError};

/// Persists encoded action sets between invocations.
pub trait ActionCacheStore: Send + Sync {
  fn store(&self, key: &CacheKey, set: &EncodedActionSet) -> Result<(), CacheStoreError>;

  /// Returns `Ok(None)` if nothing is stored under `key`.
  fn load(&self, key: &CacheKey) -> Result<Option<EncodedActionSet>, CacheStoreError>;

  /// Remove the entry for `key`. Removing a missing entry is not an error.
  fn invalidate(&self, key: &CacheKey) -> Result<(), CacheStoreError>;
}

/// Process-local store, mainly for tests and single-invocation hosts.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
  entries: Mutex<HashMap<CacheKey, EncodedActionSet>>,
}

impl InMemoryCacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ActionCacheStore for InMemoryCacheStore {
  fn store(&self, key: &CacheKey, set: &EncodedActionSet) -> Result<(), CacheStoreError> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.insert(key.clone(), set.clone());
    Ok(())
  }

  fn load(&self, key: &CacheKey) -> Result<Option<EncodedActionSet>, CacheStoreError> {
    let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(entries.get(key).cloned())
  }

  fn invalidate(&self, key: &CacheKey) -> Result<(), CacheStoreError> {
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.remove(key);
    Ok(())
  }
}

/// One JSON file per key.
///
/// Writes go to a temp file that is renamed into place, so a reader sees
/// either the previous entry or the new one.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
  base_path: PathBuf,
}

impl FileCacheStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// Store rooted at the configured cache directory.
  pub fn from_config(config: &IsolationConfig) -> Self {
    Self::new(config.cache_dir.clone())
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  fn entry_path(&self, key: &CacheKey) -> PathBuf {
    self.base_path.join(format!("{}.json", key))
  }

  fn ensure_dir(&self) -> Result<(), CacheStoreError> {
    fs::create_dir_all(&self.base_path).map_err(CacheStoreError::CreateDir)
  }
}

fn to_entry(set: &EncodedActionSet) -> CacheEntry {
  CacheEntry::new(
    set
      .iter()
      .map(|(kind, actions)| (*kind, actions.iter().map(|a| hex::encode(a.as_bytes())).collect()))
      .collect(),
  )
}

fn from_entry(entry: CacheEntry) -> Result<EncodedActionSet, CacheStoreError> {
  if entry.version != CACHE_ENTRY_VERSION {
    return Err(CacheStoreError::UnsupportedVersion(entry.version));
  }

  let mut set = EncodedActionSet::new();
  for (kind, actions) in entry.entries {
    let decoded = actions
      .iter()
      .map(|raw| {
        hex::decode(raw)
          .map(EncodedAction::from)
          .map_err(|e| CacheStoreError::InvalidEntry(format!("{}: {}", kind, e)))
      })
      .collect::<Result<Vec<_>, _>>()?;
    set.insert(kind, decoded);
  }
  Ok(set)
}

impl ActionCacheStore for FileCacheStore {
  fn store(&self, key: &CacheKey, set: &EncodedActionSet) -> Result<(), CacheStoreError> {
    self.ensure_dir()?;

    let path = self.entry_path(key);
    let temp_path = self.base_path.join(format!("{}.json.tmp", key));

    let content = serde_json::to_string_pretty(&to_entry(set)).map_err(CacheStoreError::Serialize)?;
    fs::write(&temp_path, &content).map_err(CacheStoreError::Write)?;
    fs::rename(&temp_path, &path).map_err(CacheStoreError::Write)?;

    debug!(key = %key, path = %path.display(), "wrote cache entry");
    Ok(())
  }

  fn load(&self, key: &CacheKey) -> Result<Option<EncodedActionSet>, CacheStoreError> {
    let content = match fs::read_to_string(self.entry_path(key)) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(CacheStoreError::Read(e)),
    };

    let entry: CacheEntry = serde_json::from_str(&content).map_err(CacheStoreError::Parse)?;
    from_entry(entry).map(Some)
  }

  fn invalidate(&self, key: &CacheKey) -> Result<(), CacheStoreError> {
    match fs::remove_file(self.entry_path(key)) {
      Ok(()) => {
        debug!(key = %key, "removed cache entry");
        Ok(())
      }
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(CacheStoreError::Remove(e)),
    }
  }
}
