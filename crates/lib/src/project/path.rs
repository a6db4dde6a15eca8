use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::value::{DomainObject, Value};

/// Separator between project path segments.
pub const SEPARATOR: char = ':';

/// Absolute path of a project in the build, e.g. `:libs:core`.
///
/// The root project is `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProjectPath {
  segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectPathError {
  #[error("project path '{0}' must start with ':'")]
  NotAbsolute(String),

  #[error("project path '{0}' contains an empty segment")]
  EmptySegment(String),

  #[error("project name '{0}' is not a valid path segment")]
  InvalidName(String),
}

fn valid_segment(segment: &str) -> bool {
  !segment.is_empty() && !segment.contains(SEPARATOR) && !segment.chars().any(|c| c.is_whitespace() || c == '/')
}

impl ProjectPath {
  /// The root project path, `:`.
  pub fn root() -> Self {
    Self::default()
  }

  pub fn parse(raw: &str) -> Result<Self, ProjectPathError> {
    let Some(rest) = raw.strip_prefix(SEPARATOR) else {
      return Err(ProjectPathError::NotAbsolute(raw.to_string()));
    };
    if rest.is_empty() {
      return Ok(Self::root());
    }

    let mut segments = Vec::new();
    for segment in rest.split(SEPARATOR) {
      if segment.is_empty() {
        return Err(ProjectPathError::EmptySegment(raw.to_string()));
      }
      if !valid_segment(segment) {
        return Err(ProjectPathError::InvalidName(segment.to_string()));
      }
      segments.push(segment.to_string());
    }
    Ok(Self { segments })
  }

  pub fn is_root(&self) -> bool {
    self.segments.is_empty()
  }

  /// Last segment, or `None` for the root.
  pub fn name(&self) -> Option<&str> {
    self.segments.last().map(String::as_str)
  }

  pub fn parent(&self) -> Option<ProjectPath> {
    if self.is_root() {
      return None;
    }
    Some(Self {
      segments: self.segments[..self.segments.len() - 1].to_vec(),
    })
  }

  pub fn child(&self, name: &str) -> Result<ProjectPath, ProjectPathError> {
    if !valid_segment(name) {
      return Err(ProjectPathError::InvalidName(name.to_string()));
    }
    let mut segments = self.segments.clone();
    segments.push(name.to_string());
    Ok(Self { segments })
  }

  pub fn depth(&self) -> usize {
    self.segments.len()
  }

  /// Domain object form, as captured by actions.
  pub fn to_object(&self) -> DomainObject {
    DomainObject::new("ProjectPath").with("path", self.to_string())
  }

  /// Read a path back from its domain object form.
  pub fn from_value(value: &Value) -> Option<ProjectPath> {
    let object = value.as_object()?;
    if object.type_name != "ProjectPath" {
      return None;
    }
    object.field("path")?.as_str().and_then(|raw| Self::parse(raw).ok())
  }
}

impl fmt::Display for ProjectPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_root() {
      return write!(f, "{}", SEPARATOR);
    }
    for segment in &self.segments {
      write!(f, "{}{}", SEPARATOR, segment)?;
    }
    Ok(())
  }
}

impl FromStr for ProjectPath {
  type Err = ProjectPathError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl From<ProjectPath> for Value {
  fn from(path: ProjectPath) -> Self {
    Value::Object(path.to_object())
  }
}
