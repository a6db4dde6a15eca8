use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while isolating, encoding or decoding captured values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
  /// A captured domain value has no registered codec.
  #[error("cannot isolate value of unsupported type '{type_name}' captured at {site}")]
  UnsupportedType { type_name: String, site: String },

  /// A live handle escaped into a graph being isolated.
  #[error("illegal capture of live '{declared_type}' in field '{field}' of {site}")]
  IllegalLiveReference {
    field: String,
    declared_type: String,
    site: String,
  },

  /// A domain value does not match the shape its codec expects.
  #[error("invalid '{type_name}' captured at {site}: {reason}")]
  InvalidValue {
    type_name: String,
    reason: String,
    site: String,
  },

  /// A shared cell contains itself, directly or through nested values.
  #[error("cyclic shared value in field '{field}' of {site}")]
  CyclicReference { field: String, site: String },

  /// Encoded bytes do not match the expected schema.
  #[error("corrupt encoded action: {0}")]
  CorruptEncoding(String),

  /// Another isolation attempt holds the context.
  #[error("isolation already in progress for context '{context}'")]
  Reentrant { context: String },
}

impl CodecError {
  /// True for errors that mean cached bytes are unusable and should be
  /// discarded.
  pub fn is_corrupt(&self) -> bool {
    matches!(self, CodecError::CorruptEncoding(_))
  }
}

/// The encoded tree. Private to the codec layer apart from its use in
/// custom [`ValueCodec`](super::ValueCodec) implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Encoded {
  Null,
  Bool(bool),
  Int(i64),
  /// IEEE-754 bits, so non-finite values survive the JSON layer.
  Float(u64),
  Str(String),
  List(Vec<Encoded>),
  Map(BTreeMap<String, Encoded>),
  Object {
    type_name: String,
    fields: BTreeMap<String, Encoded>,
  },
  Action {
    behavior: String,
    label: String,
    params: Vec<Encoded>,
  },
}

/// Versioned, checksummed container written as JSON.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
  pub version: u32,
  pub checksum: String,
  pub payload: Encoded,
}

/// Immutable encoded bytes of an isolated action.
///
/// Cheap to clone and safe to share across threads.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EncodedAction(Arc<[u8]>);

impl EncodedAction {
  pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
    Self(bytes.into())
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<Vec<u8>> for EncodedAction {
  fn from(bytes: Vec<u8>) -> Self {
    Self(bytes.into())
  }
}

impl AsRef<[u8]> for EncodedAction {
  fn as_ref(&self) -> &[u8] {
    &self.0
  }
}

impl fmt::Debug for EncodedAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "EncodedAction({} bytes)", self.0.len())
  }
}
