//! Settings-scoped registry of project descriptors.
//!
//! Descriptors are keyed by project path. Moving a project re-keys its
//! descriptor: it is removed under the old path, re-pathed and added back.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::project::ProjectPath;
use crate::value::{DomainObject, Value};

/// Declared project, before any project object exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
  pub path: ProjectPath,
  pub name: String,
  pub dir: PathBuf,
}

impl ProjectDescriptor {
  pub fn new(path: ProjectPath, dir: impl Into<PathBuf>) -> Self {
    let name = path.name().unwrap_or("root").to_string();
    Self {
      path,
      name,
      dir: dir.into(),
    }
  }

  /// Domain object form, as captured by actions.
  ///
  /// The directory is captured as a string, so a directory that is not
  /// valid UTF-8 is rejected rather than replaced lossily.
  pub fn to_object(&self) -> Result<DomainObject, DescriptorError> {
    let dir = self
      .dir
      .to_str()
      .ok_or_else(|| DescriptorError::NonUtf8Dir(self.dir.clone()))?;
    Ok(
      DomainObject::new("ProjectDescriptor")
        .with("path", self.path.to_object())
        .with("name", self.name.as_str())
        .with("dir", dir),
    )
  }
}

impl TryFrom<&ProjectDescriptor> for Value {
  type Error = DescriptorError;

  fn try_from(descriptor: &ProjectDescriptor) -> Result<Self, Self::Error> {
    descriptor.to_object().map(Value::Object)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
  #[error("no project registered at '{0}'")]
  NotFound(ProjectPath),

  #[error("a project is already registered at '{0}'")]
  AlreadyExists(ProjectPath),

  #[error("project directory '{}' is not valid UTF-8", .0.display())]
  NonUtf8Dir(PathBuf),
}

/// Project descriptors keyed by path.
#[derive(Debug, Default)]
pub struct ProjectDescriptorRegistry {
  projects: BTreeMap<ProjectPath, ProjectDescriptor>,
}

impl ProjectDescriptorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, descriptor: ProjectDescriptor) -> Result<(), DescriptorError> {
    if self.projects.contains_key(&descriptor.path) {
      return Err(DescriptorError::AlreadyExists(descriptor.path));
    }
    debug!(path = %descriptor.path, "adding project descriptor");
    self.projects.insert(descriptor.path.clone(), descriptor);
    Ok(())
  }

  pub fn remove(&mut self, path: &ProjectPath) -> Result<ProjectDescriptor, DescriptorError> {
    self
      .projects
      .remove(path)
      .ok_or_else(|| DescriptorError::NotFound(path.clone()))
  }

  pub fn get(&self, path: &ProjectPath) -> Option<&ProjectDescriptor> {
    self.projects.get(path)
  }

  /// All descriptors, ordered by path.
  pub fn all(&self) -> impl Iterator<Item = &ProjectDescriptor> {
    self.projects.values()
  }

  pub fn len(&self) -> usize {
    self.projects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.projects.is_empty()
  }

  /// Move the descriptor at `old` to `new`.
  ///
  /// Leaves the registry unchanged on error.
  pub fn change_descriptor_path(&mut self, old: &ProjectPath, new: ProjectPath) -> Result<(), DescriptorError> {
    if old != &new && self.projects.contains_key(&new) {
      return Err(DescriptorError::AlreadyExists(new));
    }
    let mut descriptor = self.remove(old)?;
    debug!(old = %old, new = %new, "changing project descriptor path");
    descriptor.path = new;
    self.projects.insert(descriptor.path.clone(), descriptor);
    Ok(())
  }
}
