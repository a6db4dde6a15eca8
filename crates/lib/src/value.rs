//! Values captured by lifecycle actions.
//!
//! A [`Value`] is the state an action closes over. Most variants are plain
//! data that can be copied freely. Two variants only exist in *live* graphs:
//!
//! - [`Value::Shared`]: a mutable cell shared with the code that registered
//!   the action. Isolation snapshots its current content.
//! - [`Value::Handle`]: a reference into live build state (a project, the
//!   settings object, ...). Isolation rejects it unless a codec for its type
//!   is registered.
//!
//! Isolated values never contain either variant.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::action::Action;
use crate::codec::CodecError;
use crate::context::IsolationScope;

/// A captured parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  List(Vec<Value>),
  Map(BTreeMap<String, Value>),
  /// A typed domain value object. Its type must have a registered codec.
  Object(DomainObject),
  /// A nested action, isolated recursively.
  Action(Box<Action>),
  /// Live mutable state.
  Shared(SharedValue),
  /// Live-only reference into build state.
  Handle(LiveHandle),
}

impl Value {
  /// Short name of the variant, used in diagnostics.
  pub fn kind_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Int(_) => "int",
      Value::Float(_) => "float",
      Value::Str(_) => "string",
      Value::List(_) => "list",
      Value::Map(_) => "map",
      Value::Object(_) => "object",
      Value::Action(_) => "action",
      Value::Shared(_) => "shared",
      Value::Handle(_) => "handle",
    }
  }

  /// Returns true if this value, or anything nested in it, is live-only.
  pub fn is_live(&self) -> bool {
    match self {
      Value::Shared(_) | Value::Handle(_) => true,
      Value::List(items) => items.iter().any(Value::is_live),
      Value::Map(entries) => entries.values().any(Value::is_live),
      Value::Object(object) => object.fields.values().any(Value::is_live),
      Value::Action(action) => action.params().iter().any(Value::is_live),
      _ => false,
    }
  }

  /// Returns the current content, reading through a shared cell.
  pub fn resolved(&self) -> Value {
    match self {
      Value::Shared(cell) => cell.get(),
      other => other.clone(),
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_float(&self) -> Option<f64> {
    match self {
      Value::Float(f) => Some(*f),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
    match self {
      Value::Map(entries) => Some(entries),
      _ => None,
    }
  }

  pub fn as_object(&self) -> Option<&DomainObject> {
    match self {
      Value::Object(object) => Some(object),
      _ => None,
    }
  }

  pub fn as_action(&self) -> Option<&Action> {
    match self {
      Value::Action(action) => Some(action),
      _ => None,
    }
  }

  /// Look up a key in a map or a field in a domain object.
  pub fn get(&self, key: &str) -> Option<&Value> {
    match self {
      Value::Map(entries) => entries.get(key),
      Value::Object(object) => object.field(key),
      _ => None,
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Str(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Str(s)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<i32> for Value {
  fn from(i: i32) -> Self {
    Value::Int(i64::from(i))
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self {
    Value::Float(f)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::List(items.into_iter().map(Into::into).collect())
  }
}

impl From<BTreeMap<String, Value>> for Value {
  fn from(entries: BTreeMap<String, Value>) -> Self {
    Value::Map(entries)
  }
}

impl From<DomainObject> for Value {
  fn from(object: DomainObject) -> Self {
    Value::Object(object)
  }
}

impl From<Action> for Value {
  fn from(action: Action) -> Self {
    Value::Action(Box::new(action))
  }
}

impl From<SharedValue> for Value {
  fn from(cell: SharedValue) -> Self {
    Value::Shared(cell)
  }
}

impl From<LiveHandle> for Value {
  fn from(handle: LiveHandle) -> Self {
    Value::Handle(handle)
  }
}

/// A typed value object such as a project path.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainObject {
  pub type_name: String,
  pub fields: BTreeMap<String, Value>,
}

impl DomainObject {
  pub fn new(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      fields: BTreeMap::new(),
    }
  }

  /// Builder-style field setter.
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.fields.insert(name.into(), value.into());
    self
  }

  pub fn field(&self, name: &str) -> Option<&Value> {
    self.fields.get(name)
  }
}

/// Live mutable state captured by an action.
///
/// Clones share the same cell. Writes through any clone are visible to every
/// live action holding it, but never to an isolated copy.
#[derive(Clone, Default)]
pub struct SharedValue {
  inner: Arc<Mutex<Value>>,
}

impl SharedValue {
  pub fn new(value: impl Into<Value>) -> Self {
    Self {
      inner: Arc::new(Mutex::new(value.into())),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Value> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Snapshot of the current content.
  pub fn get(&self) -> Value {
    self.lock().clone()
  }

  pub fn set(&self, value: impl Into<Value>) {
    *self.lock() = value.into();
  }

  pub fn update(&self, f: impl FnOnce(&mut Value)) {
    f(&mut self.lock());
  }

  /// Stable identity of the cell, used to detect cycles while copying.
  pub(crate) fn addr(&self) -> usize {
    Arc::as_ptr(&self.inner) as *const () as usize
  }

  pub fn ptr_eq(&self, other: &SharedValue) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for SharedValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.inner.try_lock() {
      Ok(value) => f.debug_tuple("SharedValue").field(&*value).finish(),
      Err(_) => f.write_str("SharedValue(<locked>)"),
    }
  }
}

/// Cells compare by identity. Two distinct cells are never equal, even with
/// equal content, since writes through one are not seen by the other.
impl PartialEq for SharedValue {
  fn eq(&self, other: &Self) -> bool {
    self.ptr_eq(other)
  }
}

/// A live reference into build state.
///
/// Handles carry the identity of the object they point at (`type_name` and
/// `id`) and the isolation scope of the registry they belong to. Reading
/// through a handle while that scope is isolating is an error.
#[derive(Clone)]
pub struct LiveHandle {
  type_name: String,
  id: String,
  scope: IsolationScope,
}

impl LiveHandle {
  pub(crate) fn new(type_name: impl Into<String>, id: impl Into<String>, scope: IsolationScope) -> Self {
    Self {
      type_name: type_name.into(),
      id: id.into(),
      scope,
    }
  }

  /// Declared type of the live object, e.g. `"Project"`.
  pub fn type_name(&self) -> &str {
    &self.type_name
  }

  /// Identity of the live object, e.g. `":app"`. Reading the identity never
  /// dereferences the handle.
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Dereference the handle.
  ///
  /// Fails with [`CodecError::IllegalLiveReference`] while the owning scope
  /// is isolating.
  pub fn access(&self) -> Result<&str, CodecError> {
    if self.scope.is_isolating() {
      return Err(CodecError::IllegalLiveReference {
        field: self.id.clone(),
        declared_type: self.type_name.clone(),
        site: "live handle dereferenced during isolation".to_string(),
      });
    }
    Ok(&self.id)
  }
}

impl fmt::Debug for LiveHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LiveHandle")
      .field("type_name", &self.type_name)
      .field("id", &self.id)
      .finish()
  }
}

impl PartialEq for LiveHandle {
  fn eq(&self, other: &Self) -> bool {
    self.type_name == other.type_name && self.id == other.id
  }
}
