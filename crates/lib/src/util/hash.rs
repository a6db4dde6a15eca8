//! Hashing utilities for cache keys and encoded payload checksums.
//!
//! - `ObjectHash`: a truncated 20-character hash used as a cache key
//! - `ContentHash`: a full 64-character hash guarding encoded payloads
//! - `hash_bytes()` / `hash_parts()`: arbitrary byte hashing

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A truncated SHA-256 identifying a cached object.
///
/// The hash is a lowercase hexadecimal string, e.g. `"a1b2c3d4e5f6789012ab"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl ObjectHash {
  fn truncate(full: &ContentHash) -> Self {
    ObjectHash(full.0[..OBJ_HASH_PREFIX_LEN].to_string())
  }
}

/// Types whose JSON form identifies them for caching purposes.
pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_vec(self)?;
    Ok(ObjectHash::truncate(&hash_bytes(&serialized)))
  }
}

/// A full 64-character SHA-256 hash for content verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

/// Hash a sequence of string parts into a truncated object hash.
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
pub fn hash_parts<S: AsRef<str>>(parts: &[S]) -> ObjectHash {
  let mut hasher = Sha256::new();
  for part in parts {
    let bytes = part.as_ref().as_bytes();
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
  }
  ObjectHash::truncate(&ContentHash(hex::encode(hasher.finalize())))
}
