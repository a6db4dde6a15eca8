//! Isolation codec registry.
//!
//! Encodes captured [`Value`]s into a reference-free tree and back. Plain data
//! (primitives, strings, lists, maps) and nested actions are handled by the
//! registry itself; domain value objects and live handles are dispatched to a
//! [`ValueCodec`] registered under their type name. Anything without a codec
//! fails fast with a diagnostic naming the type and the capture site.
//!
//! # Byte Layout
//!
//! ```text
//! { "version": 1, "checksum": "<sha256 of payload>", "payload": <tree> }
//! ```
//!
//! The layout is private: callers only rely on `decode(encode(v))` being
//! equivalent to `v`. Maps are ordered, so encoding is deterministic.

mod builtin;
mod types;

pub use builtin::*;
pub use types::*;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::consts::{ENCODING_VERSION, MAX_NESTING_DEPTH};
use crate::util::hash::hash_bytes;
use crate::value::Value;

/// Encoder/decoder for one domain value type or live handle type.
pub trait ValueCodec: Send + Sync {
  /// Type name matched against [`DomainObject::type_name`](crate::value::DomainObject)
  /// or [`LiveHandle::type_name`](crate::value::LiveHandle::type_name).
  fn type_name(&self) -> &str;

  /// Encode a value of this type. Must not dereference live handles.
  fn encode(&self, value: &Value, cx: &mut EncodeContext<'_>) -> Result<Encoded, CodecError>;

  /// Decode an [`Encoded::Object`] whose `type_name` is this codec's.
  fn decode(&self, encoded: &Encoded, cx: &mut DecodeContext<'_>) -> Result<Value, CodecError>;
}

/// Registry of value codecs. Read-only once built.
#[derive(Clone)]
pub struct CodecRegistry {
  codecs: HashMap<String, Arc<dyn ValueCodec>>,
  verify_checksums: bool,
}

impl Default for CodecRegistry {
  fn default() -> Self {
    Self::with_builtins()
  }
}

impl fmt::Debug for CodecRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut types: Vec<&String> = self.codecs.keys().collect();
    types.sort();
    f.debug_struct("CodecRegistry")
      .field("types", &types)
      .field("verify_checksums", &self.verify_checksums)
      .finish()
  }
}

impl CodecRegistry {
  /// A registry with no domain codecs: only plain data and nested actions.
  pub fn empty() -> Self {
    Self {
      codecs: HashMap::new(),
      verify_checksums: true,
    }
  }

  /// A registry with the built-in domain codecs (`ProjectPath`,
  /// `ProjectDescriptor`).
  pub fn with_builtins() -> Self {
    let mut registry = Self::empty();
    registry.register(Arc::new(ProjectPathCodec));
    registry.register(Arc::new(project_descriptor_codec()));
    registry
  }

  /// Register a codec, replacing any codec for the same type.
  pub fn register(&mut self, codec: Arc<dyn ValueCodec>) -> &mut Self {
    self.codecs.insert(codec.type_name().to_string(), codec);
    self
  }

  pub fn with_checksum_verification(mut self, verify: bool) -> Self {
    self.verify_checksums = verify;
    self
  }

  pub fn supports(&self, type_name: &str) -> bool {
    self.codecs.contains_key(type_name)
  }

  fn codec(&self, type_name: &str) -> Option<&Arc<dyn ValueCodec>> {
    self.codecs.get(type_name)
  }

  /// Encode a single value to bytes. `site` names where it was captured.
  pub fn encode(&self, value: &Value, site: &str) -> Result<Vec<u8>, CodecError> {
    let mut cx = EncodeContext::new(self, site);
    let payload = cx.encode_value(value)?;
    self.seal(&payload)
  }

  /// Decode bytes produced by [`encode`](Self::encode).
  pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
    let payload = self.open(bytes)?;
    DecodeContext::new(self).decode_value(&payload)
  }

  /// Encode an action and everything it captured.
  pub fn encode_action(&self, action: &Action) -> Result<EncodedAction, CodecError> {
    let mut cx = EncodeContext::new(self, action.label());
    let payload = cx.encode_action(action)?;
    self.seal(&payload).map(EncodedAction::from)
  }

  /// Decode bytes produced by [`encode_action`](Self::encode_action).
  pub fn decode_action(&self, bytes: &[u8]) -> Result<Action, CodecError> {
    let payload = self.open(bytes)?;
    match payload {
      Encoded::Action { .. } => match DecodeContext::new(self).decode_value(&payload)? {
        Value::Action(action) => Ok(*action),
        _ => Err(CodecError::CorruptEncoding("action payload decoded to a non-action".to_string())),
      },
      _ => Err(CodecError::CorruptEncoding("payload is not an action".to_string())),
    }
  }

  fn seal(&self, payload: &Encoded) -> Result<Vec<u8>, CodecError> {
    let tree = serde_json::to_vec(payload).map_err(|e| CodecError::CorruptEncoding(e.to_string()))?;
    let envelope = Envelope {
      version: ENCODING_VERSION,
      checksum: hash_bytes(&tree).0,
      payload: payload.clone(),
    };
    serde_json::to_vec(&envelope).map_err(|e| CodecError::CorruptEncoding(e.to_string()))
  }

  fn open(&self, bytes: &[u8]) -> Result<Encoded, CodecError> {
    let envelope: Envelope =
      serde_json::from_slice(bytes).map_err(|e| CodecError::CorruptEncoding(format!("unreadable envelope: {}", e)))?;

    if envelope.version != ENCODING_VERSION {
      return Err(CodecError::CorruptEncoding(format!(
        "encoding version {} does not match {}",
        envelope.version, ENCODING_VERSION
      )));
    }

    if self.verify_checksums {
      let tree = serde_json::to_vec(&envelope.payload).map_err(|e| CodecError::CorruptEncoding(e.to_string()))?;
      let actual = hash_bytes(&tree);
      if actual.0 != envelope.checksum {
        return Err(CodecError::CorruptEncoding(format!(
          "checksum mismatch: expected {}, got {}",
          envelope.checksum, actual
        )));
      }
    }

    Ok(envelope.payload)
  }
}

/// State threaded through one encoding walk.
pub struct EncodeContext<'a> {
  registry: &'a CodecRegistry,
  site: String,
  path: Vec<String>,
  visiting: Vec<usize>,
  depth: usize,
}

impl<'a> EncodeContext<'a> {
  fn new(registry: &'a CodecRegistry, site: &str) -> Self {
    Self {
      registry,
      site: site.to_string(),
      path: Vec::new(),
      visiting: Vec::new(),
      depth: 0,
    }
  }

  /// Capture site of the value being encoded, e.g. `"settings.lua:4"`.
  pub fn site(&self) -> &str {
    &self.site
  }

  /// Path of the field being encoded, e.g. `"params[0].owner"`.
  pub fn field_path(&self) -> String {
    let mut out = String::new();
    for segment in &self.path {
      if !out.is_empty() && !segment.starts_with('[') {
        out.push('.');
      }
      out.push_str(segment);
    }
    if out.is_empty() { "<root>".to_string() } else { out }
  }

  /// Encode a named field of the current value.
  pub fn encode_field(&mut self, name: &str, value: &Value) -> Result<Encoded, CodecError> {
    self.path.push(name.to_string());
    let result = self.encode_value(value);
    self.path.pop();
    result
  }

  fn encode_index(&mut self, index: usize, value: &Value) -> Result<Encoded, CodecError> {
    self.path.push(format!("[{}]", index));
    let result = self.encode_value(value);
    self.path.pop();
    result
  }

  /// Encode `value`, counting lists, maps, objects and nested actions
  /// against [`MAX_NESTING_DEPTH`].
  pub fn encode_value(&mut self, value: &Value) -> Result<Encoded, CodecError> {
    let nests = matches!(
      value,
      Value::List(_) | Value::Map(_) | Value::Object(_) | Value::Action(_)
    );
    if !nests {
      return self.encode_inner(value);
    }
    if self.depth >= MAX_NESTING_DEPTH {
      return Err(CodecError::InvalidValue {
        type_name: value.kind_name().to_string(),
        reason: format!("nested deeper than {} levels", MAX_NESTING_DEPTH),
        site: format!("{} ({})", self.site, self.field_path()),
      });
    }
    self.depth += 1;
    let result = self.encode_inner(value);
    self.depth -= 1;
    result
  }

  fn encode_inner(&mut self, value: &Value) -> Result<Encoded, CodecError> {
    match value {
      Value::Null => Ok(Encoded::Null),
      Value::Bool(b) => Ok(Encoded::Bool(*b)),
      Value::Int(i) => Ok(Encoded::Int(*i)),
      Value::Float(f) => Ok(Encoded::Float(f.to_bits())),
      Value::Str(s) => Ok(Encoded::Str(s.clone())),
      Value::List(items) => {
        let mut encoded = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
          encoded.push(self.encode_index(i, item)?);
        }
        Ok(Encoded::List(encoded))
      }
      Value::Map(entries) => {
        let mut encoded = std::collections::BTreeMap::new();
        for (key, item) in entries {
          encoded.insert(key.clone(), self.encode_field(key, item)?);
        }
        Ok(Encoded::Map(encoded))
      }
      Value::Object(object) => match self.registry.codec(&object.type_name).cloned() {
        Some(codec) => codec.encode(value, self),
        None => Err(CodecError::UnsupportedType {
          type_name: object.type_name.clone(),
          site: format!("{} ({})", self.site, self.field_path()),
        }),
      },
      Value::Action(action) => {
        let nested = format!("{} > {}", self.site, action.label());
        let outer = std::mem::replace(&mut self.site, nested);
        let result = self.encode_action(action);
        self.site = outer;
        result
      }
      Value::Shared(cell) => {
        let addr = cell.addr();
        if self.visiting.contains(&addr) {
          return Err(CodecError::CyclicReference {
            field: self.field_path(),
            site: self.site.clone(),
          });
        }
        // Snapshot first so the cell is unlocked while nested values encode.
        let snapshot = cell.get();
        self.visiting.push(addr);
        let result = self.encode_value(&snapshot);
        self.visiting.pop();
        result
      }
      Value::Handle(handle) => match self.registry.codec(handle.type_name()).cloned() {
        Some(codec) => codec.encode(value, self),
        None => Err(CodecError::IllegalLiveReference {
          field: self.field_path(),
          declared_type: handle.type_name().to_string(),
          site: self.site.clone(),
        }),
      },
    }
  }

  fn encode_action(&mut self, action: &Action) -> Result<Encoded, CodecError> {
    let saved = std::mem::take(&mut self.path);
    let mut params = Vec::with_capacity(action.params().len());
    let mut result = Ok(());
    for (i, param) in action.params().iter().enumerate() {
      self.path = vec![format!("params[{}]", i)];
      match self.encode_value(param) {
        Ok(encoded) => params.push(encoded),
        Err(e) => {
          result = Err(e);
          break;
        }
      }
    }
    self.path = saved;
    result?;
    Ok(Encoded::Action {
      behavior: action.behavior().to_string(),
      label: action.label().to_string(),
      params,
    })
  }
}

/// State threaded through one decoding walk.
pub struct DecodeContext<'a> {
  registry: &'a CodecRegistry,
  path: Vec<String>,
}

impl<'a> DecodeContext<'a> {
  fn new(registry: &'a CodecRegistry) -> Self {
    Self {
      registry,
      path: Vec::new(),
    }
  }

  pub fn field_path(&self) -> String {
    if self.path.is_empty() {
      "<root>".to_string()
    } else {
      self.path.join(".")
    }
  }

  pub fn decode_field(&mut self, name: &str, encoded: &Encoded) -> Result<Value, CodecError> {
    self.path.push(name.to_string());
    let result = self.decode_value(encoded);
    self.path.pop();
    result
  }

  pub fn decode_value(&mut self, encoded: &Encoded) -> Result<Value, CodecError> {
    match encoded {
      Encoded::Null => Ok(Value::Null),
      Encoded::Bool(b) => Ok(Value::Bool(*b)),
      Encoded::Int(i) => Ok(Value::Int(*i)),
      Encoded::Float(bits) => Ok(Value::Float(f64::from_bits(*bits))),
      Encoded::Str(s) => Ok(Value::Str(s.clone())),
      Encoded::List(items) => {
        let mut values = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
          values.push(self.decode_field(&format!("[{}]", i), item)?);
        }
        Ok(Value::List(values))
      }
      Encoded::Map(entries) => {
        let mut values = std::collections::BTreeMap::new();
        for (key, item) in entries {
          values.insert(key.clone(), self.decode_field(key, item)?);
        }
        Ok(Value::Map(values))
      }
      Encoded::Object { type_name, .. } => match self.registry.codec(type_name).cloned() {
        Some(codec) => codec.decode(encoded, self),
        None => Err(CodecError::CorruptEncoding(format!(
          "no codec for type '{}' at {}",
          type_name,
          self.field_path()
        ))),
      },
      Encoded::Action {
        behavior,
        label,
        params,
      } => {
        let mut values = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
          values.push(self.decode_field(&format!("{}.params[{}]", label, i), param)?);
        }
        Ok(Value::Action(Box::new(Action::from_parts(
          behavior.clone(),
          label.clone(),
          values,
        ))))
      }
    }
  }
}
