//! Built-in codecs.

use std::collections::BTreeMap;

use crate::codec::{CodecError, DecodeContext, EncodeContext, Encoded, ValueCodec};
use crate::project::ProjectPath;
use crate::value::{DomainObject, Value};

/// Shape of a single field checked by [`SchemaCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
  Str,
  Int,
  Bool,
  Float,
  List,
  Map,
  /// A nested domain object of the given type.
  Object(String),
  /// Any isolatable value.
  Any,
}

impl FieldKind {
  fn accepts(&self, value: &Value) -> bool {
    match (self, value.resolved()) {
      (FieldKind::Any, _) => true,
      (FieldKind::Str, Value::Str(_)) => true,
      (FieldKind::Int, Value::Int(_)) => true,
      (FieldKind::Bool, Value::Bool(_)) => true,
      (FieldKind::Float, Value::Float(_)) => true,
      (FieldKind::List, Value::List(_)) => true,
      (FieldKind::Map, Value::Map(_)) => true,
      (FieldKind::Object(expected), Value::Object(object)) => &object.type_name == expected,
      _ => false,
    }
  }

  fn accepts_encoded(&self, encoded: &Encoded) -> bool {
    match (self, encoded) {
      (FieldKind::Any, _) => true,
      (FieldKind::Str, Encoded::Str(_)) => true,
      (FieldKind::Int, Encoded::Int(_)) => true,
      (FieldKind::Bool, Encoded::Bool(_)) => true,
      (FieldKind::Float, Encoded::Float(_)) => true,
      (FieldKind::List, Encoded::List(_)) => true,
      (FieldKind::Map, Encoded::Map(_)) => true,
      (FieldKind::Object(expected), Encoded::Object { type_name, .. }) => type_name == expected,
      _ => false,
    }
  }
}

/// Codec for a domain object with a fixed set of typed fields.
///
/// Both directions reject missing, unknown or mistyped fields.
#[derive(Debug, Clone)]
pub struct SchemaCodec {
  type_name: String,
  fields: Vec<(String, FieldKind)>,
}

impl SchemaCodec {
  pub fn new(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      fields: Vec::new(),
    }
  }

  pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
    self.fields.push((name.into(), kind));
    self
  }

  fn invalid(&self, cx: &EncodeContext<'_>, reason: String) -> CodecError {
    CodecError::InvalidValue {
      type_name: self.type_name.clone(),
      reason,
      site: format!("{} ({})", cx.site(), cx.field_path()),
    }
  }
}

impl ValueCodec for SchemaCodec {
  fn type_name(&self) -> &str {
    &self.type_name
  }

  fn encode(&self, value: &Value, cx: &mut EncodeContext<'_>) -> Result<Encoded, CodecError> {
    let Value::Object(object) = value else {
      return Err(self.invalid(cx, format!("expected object, found {}", value.kind_name())));
    };

    if let Some(unknown) = object.fields.keys().find(|k| !self.fields.iter().any(|(name, _)| name == *k)) {
      return Err(self.invalid(cx, format!("unknown field '{}'", unknown)));
    }

    let mut fields = BTreeMap::new();
    for (name, kind) in &self.fields {
      let field = object
        .field(name)
        .ok_or_else(|| self.invalid(cx, format!("missing field '{}'", name)))?;
      if !kind.accepts(field) {
        return Err(self.invalid(cx, format!("field '{}' has kind {}", name, field.kind_name())));
      }
      fields.insert(name.clone(), cx.encode_field(name, field)?);
    }

    Ok(Encoded::Object {
      type_name: self.type_name.clone(),
      fields,
    })
  }

  fn decode(&self, encoded: &Encoded, cx: &mut DecodeContext<'_>) -> Result<Value, CodecError> {
    let Encoded::Object { fields, .. } = encoded else {
      return Err(CodecError::CorruptEncoding(format!("expected {} object", self.type_name)));
    };

    if fields.len() != self.fields.len() {
      return Err(CodecError::CorruptEncoding(format!(
        "{} has {} fields, expected {}",
        self.type_name,
        fields.len(),
        self.fields.len()
      )));
    }

    let mut object = DomainObject::new(self.type_name.clone());
    for (name, kind) in &self.fields {
      let field = fields
        .get(name)
        .ok_or_else(|| CodecError::CorruptEncoding(format!("{} is missing field '{}'", self.type_name, name)))?;
      if !kind.accepts_encoded(field) {
        return Err(CodecError::CorruptEncoding(format!(
          "{} field '{}' has the wrong kind",
          self.type_name, name
        )));
      }
      object.fields.insert(name.clone(), cx.decode_field(name, field)?);
    }

    Ok(Value::Object(object))
  }
}

/// Codec for `ProjectPath` objects, validating the path syntax both ways.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectPathCodec;

impl ProjectPathCodec {
  pub const TYPE_NAME: &'static str = "ProjectPath";
}

impl ValueCodec for ProjectPathCodec {
  fn type_name(&self) -> &str {
    Self::TYPE_NAME
  }

  fn encode(&self, value: &Value, cx: &mut EncodeContext<'_>) -> Result<Encoded, CodecError> {
    let invalid = |reason: String| CodecError::InvalidValue {
      type_name: Self::TYPE_NAME.to_string(),
      reason,
      site: format!("{} ({})", cx.site(), cx.field_path()),
    };

    let Value::Object(object) = value else {
      return Err(invalid(format!("expected object, found {}", value.kind_name())));
    };
    if let Some(unknown) = object.fields.keys().find(|k| k.as_str() != "path") {
      return Err(invalid(format!("unknown field '{}'", unknown)));
    }

    let raw = object
      .field("path")
      .map(Value::resolved)
      .and_then(|v| v.as_str().map(str::to_string))
      .ok_or_else(|| invalid("missing string field 'path'".to_string()))?;
    let path = ProjectPath::parse(&raw).map_err(|e| invalid(e.to_string()))?;

    Ok(Encoded::Object {
      type_name: Self::TYPE_NAME.to_string(),
      fields: BTreeMap::from([("path".to_string(), Encoded::Str(path.to_string()))]),
    })
  }

  fn decode(&self, encoded: &Encoded, _cx: &mut DecodeContext<'_>) -> Result<Value, CodecError> {
    let path = match encoded {
      Encoded::Object { fields, .. } if fields.len() == 1 => match fields.get("path") {
        Some(Encoded::Str(path)) => path,
        _ => return Err(CodecError::CorruptEncoding("ProjectPath without a string path".to_string())),
      },
      _ => return Err(CodecError::CorruptEncoding("malformed ProjectPath".to_string())),
    };
    let path = ProjectPath::parse(path).map_err(|e| CodecError::CorruptEncoding(e.to_string()))?;
    Ok(Value::Object(path.to_object()))
  }
}

/// Codec for `ProjectDescriptor` objects: `{ path: ProjectPath, name, dir }`.
pub fn project_descriptor_codec() -> SchemaCodec {
  SchemaCodec::new("ProjectDescriptor")
    .field("path", FieldKind::Object(ProjectPathCodec::TYPE_NAME.to_string()))
    .field("name", FieldKind::Str)
    .field("dir", FieldKind::Str)
}

/// Encodes a live handle by its identity, as a stand-in domain object.
///
/// For example a `Project` handle can be captured as the `ProjectPath` of the
/// project it points at. The handle is never dereferenced. Decoding goes
/// through the stand-in type's codec, so isolated copies only ever see the
/// stand-in.
#[derive(Debug, Clone)]
pub struct HandleIdentityCodec {
  handle_type: String,
  stand_in: String,
  field: String,
}

impl HandleIdentityCodec {
  pub fn new(handle_type: impl Into<String>, stand_in: impl Into<String>, field: impl Into<String>) -> Self {
    Self {
      handle_type: handle_type.into(),
      stand_in: stand_in.into(),
      field: field.into(),
    }
  }

  /// Captures `Project` handles as `ProjectPath` objects.
  pub fn project_path() -> Self {
    Self::new("Project", ProjectPathCodec::TYPE_NAME, "path")
  }
}

impl ValueCodec for HandleIdentityCodec {
  fn type_name(&self) -> &str {
    &self.handle_type
  }

  fn encode(&self, value: &Value, cx: &mut EncodeContext<'_>) -> Result<Encoded, CodecError> {
    let Value::Handle(handle) = value else {
      return Err(CodecError::InvalidValue {
        type_name: self.handle_type.clone(),
        reason: format!("expected live handle, found {}", value.kind_name()),
        site: format!("{} ({})", cx.site(), cx.field_path()),
      });
    };
    let stand_in = Value::Object(DomainObject::new(self.stand_in.clone()).with(self.field.clone(), handle.id()));
    cx.encode_value(&stand_in)
  }

  fn decode(&self, _encoded: &Encoded, _cx: &mut DecodeContext<'_>) -> Result<Value, CodecError> {
    Err(CodecError::CorruptEncoding(format!(
      "live '{}' handles are never encoded directly",
      self.handle_type
    )))
  }
}
