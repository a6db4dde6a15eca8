//! Types for firing lifecycle actions.
//!
//! This module defines the target trait actions run against and the errors
//! the executor reports.

use std::any::Any;

use anyhow::anyhow;
use thiserror::Error;

use crate::registry::LifecycleEventKind;

/// A live object actions fire against (the settings object, a project, ...).
pub trait LifecycleTarget: Any {
  /// Human-readable identity used in logs, e.g. `"project ':app'"`.
  fn describe(&self) -> String;

  fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Downcast a target to the concrete type a behavior expects.
pub fn downcast_target<T: LifecycleTarget>(target: &mut dyn LifecycleTarget) -> anyhow::Result<&mut T> {
  let description = target.describe();
  target
    .as_any_mut()
    .downcast_mut::<T>()
    .ok_or_else(|| anyhow!("{} is not a {}", description, std::any::type_name::<T>()))
}

/// Errors that can occur while firing an event kind.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// A user action failed. Remaining actions for the event were skipped.
  #[error("action #{index} ({label}) failed during {kind}: {source:#}")]
  ActionExecutionFailure {
    kind: LifecycleEventKind,
    index: usize,
    label: String,
    #[source]
    source: anyhow::Error,
  },

  /// No behavior is registered for an action's tag.
  #[error("action #{index} ({label}) during {kind} uses unknown behavior '{tag}'")]
  UnknownBehavior {
    kind: LifecycleEventKind,
    index: usize,
    label: String,
    tag: String,
  },
}

impl ExecuteError {
  /// Event kind that was firing.
  pub fn kind(&self) -> LifecycleEventKind {
    match self {
      ExecuteError::ActionExecutionFailure { kind, .. } | ExecuteError::UnknownBehavior { kind, .. } => *kind,
    }
  }

  /// Position of the failing action in the fired sequence.
  pub fn index(&self) -> usize {
    match self {
      ExecuteError::ActionExecutionFailure { index, .. } | ExecuteError::UnknownBehavior { index, .. } => *index,
    }
  }
}

/// Result of firing one event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireResult {
  pub kind: LifecycleEventKind,
  /// Actions replayed from an isolated, restored set.
  pub replayed: usize,
  /// Actions taken from the live registry.
  pub live: usize,
}

impl FireResult {
  pub fn total(&self) -> usize {
    self.replayed + self.live
  }
}
