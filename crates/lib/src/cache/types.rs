use std::collections::BTreeMap;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::CodecError;
use crate::consts::CACHE_ENTRY_VERSION;
use crate::registry::LifecycleEventKind;
use crate::util::hash::{HashError, Hashable, ObjectHash, hash_parts};

/// Identifies one persisted set of lifecycle actions.
///
/// Derived from whatever inputs decide whether live configuration can be
/// skipped (script contents, requested tasks, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey(ObjectHash);

impl CacheKey {
  /// Key from ordered string inputs.
  pub fn for_inputs<S: AsRef<str>>(inputs: &[S]) -> Self {
    Self(hash_parts(inputs))
  }

  /// Key from the JSON form of `inputs`.
  pub fn of<T: Hashable>(inputs: &T) -> Result<Self, HashError> {
    inputs.compute_hash().map(Self)
  }

  pub fn as_str(&self) -> &str {
    &self.0.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// On-disk form of an encoded action set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub version: u32,
  /// Hex-encoded action bytes per event kind, in registration order.
  pub entries: BTreeMap<LifecycleEventKind, Vec<String>>,
}

impl CacheEntry {
  pub fn new(entries: BTreeMap<LifecycleEventKind, Vec<String>>) -> Self {
    Self {
      version: CACHE_ENTRY_VERSION,
      entries,
    }
  }
}

/// Errors from a cache store backend.
#[derive(Debug, Error)]
pub enum CacheStoreError {
  #[error("failed to create cache directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read cache entry: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write cache entry: {0}")]
  Write(#[source] io::Error),

  #[error("failed to remove cache entry: {0}")]
  Remove(#[source] io::Error),

  #[error("failed to serialize cache entry: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("failed to parse cache entry: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("unsupported cache entry version: {0}")]
  UnsupportedVersion(u32),

  #[error("invalid cache entry: {0}")]
  InvalidEntry(String),
}

impl CacheStoreError {
  /// True when the stored bytes exist but cannot be used.
  pub fn is_corrupt(&self) -> bool {
    matches!(
      self,
      CacheStoreError::Parse(_) | CacheStoreError::UnsupportedVersion(_) | CacheStoreError::InvalidEntry(_)
    )
  }
}

/// Errors from persisting or restoring lifecycle actions.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error(transparent)]
  Codec(#[from] CodecError),

  #[error(transparent)]
  Store(#[from] CacheStoreError),
}
