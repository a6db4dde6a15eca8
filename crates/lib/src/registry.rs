//! Lifecycle action registry.
//!
//! Records, per lifecycle event kind, the ordered actions registered during a
//! live configuration pass. Registration uses interior mutability so actions
//! can register further actions while the executor is firing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::action::Action;
use crate::context::IsolationContext;
use crate::value::LiveHandle;

/// A point in the configuration sequence at which registered actions fire.
///
/// Ordered by when the point occurs during configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
  /// The settings script has been evaluated.
  SettingsEvaluated,
  /// The project hierarchy has been created.
  ProjectsLoaded,
  /// Immediately before each project is evaluated.
  BeforeProject,
  /// Immediately after each project is evaluated.
  AfterProject,
  /// All projects have been evaluated.
  ProjectsEvaluated,
}

impl LifecycleEventKind {
  pub const ALL: [LifecycleEventKind; 5] = [
    LifecycleEventKind::SettingsEvaluated,
    LifecycleEventKind::ProjectsLoaded,
    LifecycleEventKind::BeforeProject,
    LifecycleEventKind::AfterProject,
    LifecycleEventKind::ProjectsEvaluated,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      LifecycleEventKind::SettingsEvaluated => "settings_evaluated",
      LifecycleEventKind::ProjectsLoaded => "projects_loaded",
      LifecycleEventKind::BeforeProject => "before_project",
      LifecycleEventKind::AfterProject => "after_project",
      LifecycleEventKind::ProjectsEvaluated => "projects_evaluated",
    }
  }

  /// True for kinds that fire once per project rather than once per build.
  pub fn is_per_project(&self) -> bool {
    matches!(self, LifecycleEventKind::BeforeProject | LifecycleEventKind::AfterProject)
  }
}

impl FromStr for LifecycleEventKind {
  type Err = UnknownEventKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    LifecycleEventKind::ALL
      .into_iter()
      .find(|kind| kind.as_str() == s)
      .ok_or_else(|| UnknownEventKind(s.to_string()))
  }
}

/// A string that names no lifecycle event kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lifecycle event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl fmt::Display for LifecycleEventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Ordered actions per event kind for one build invocation.
#[derive(Debug, Default)]
pub struct LifecycleActionRegistry {
  actions: Mutex<BTreeMap<LifecycleEventKind, Vec<Action>>>,
  context: IsolationContext,
}

impl LifecycleActionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a registry whose isolation context carries `name` in logs.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      actions: Mutex::default(),
      context: IsolationContext::named(name),
    }
  }

  fn lock(&self) -> MutexGuard<'_, BTreeMap<LifecycleEventKind, Vec<Action>>> {
    self.actions.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// The isolation context owned by this registry.
  pub fn context(&self) -> &IsolationContext {
    &self.context
  }

  /// Create a live handle scoped to this registry's isolation context.
  pub fn handle(&self, type_name: impl Into<String>, id: impl Into<String>) -> LiveHandle {
    self.context.handle(type_name, id)
  }

  /// Append `action` to the sequence for `kind`. No deduplication.
  pub fn register(&self, kind: LifecycleEventKind, action: Action) {
    let mut actions = self.lock();
    let sequence = actions.entry(kind).or_default();
    debug!(kind = %kind, label = %action.label(), index = sequence.len(), "registering action");
    sequence.push(action);
  }

  /// The ordered actions for `kind`. Does not consume them.
  pub fn actions_for(&self, kind: LifecycleEventKind) -> Vec<Action> {
    self.lock().get(&kind).cloned().unwrap_or_default()
  }

  /// Number of actions registered for `kind`.
  pub fn count(&self, kind: LifecycleEventKind) -> usize {
    self.lock().get(&kind).map_or(0, Vec::len)
  }

  /// Total number of registered actions.
  pub fn len(&self) -> usize {
    self.lock().values().map(Vec::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Event kinds with at least one action, in lifecycle order.
  pub fn kinds(&self) -> Vec<LifecycleEventKind> {
    self
      .lock()
      .iter()
      .filter(|(_, actions)| !actions.is_empty())
      .map(|(kind, _)| *kind)
      .collect()
  }

  /// Copy of every sequence, keyed by kind.
  pub fn snapshot(&self) -> BTreeMap<LifecycleEventKind, Vec<Action>> {
    self.lock().clone()
  }

  /// Remove and return every sequence.
  pub fn take_all(&self) -> BTreeMap<LifecycleEventKind, Vec<Action>> {
    std::mem::take(&mut *self.lock())
  }

  /// Drop every action registered for `kind`.
  pub fn clear(&self, kind: LifecycleEventKind) -> usize {
    self.lock().remove(&kind).map_or(0, |actions| actions.len())
  }

  /// Clear all state between build invocations.
  pub fn reset(&self) {
    let removed = std::mem::take(&mut *self.lock());
    debug!(
      action_count = removed.values().map(Vec::len).sum::<usize>(),
      "lifecycle action registry reset"
    );
  }
}
