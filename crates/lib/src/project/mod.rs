//! Project-scoped lifecycle actions.
//!
//! Before/after-project actions are registered once during settings, isolated
//! as one batch and then replayed for every project. Each replay decodes a
//! fresh copy from the encoded form, so nothing one project's run produces is
//! visible to the next.

mod descriptor;
mod path;

pub use descriptor::*;
pub use path::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::codec::CodecError;
use crate::execute::{ExecuteError, LifecycleActionExecutor, LifecycleTarget};
use crate::isolate::{ActionIsolator, EncodedActionSet};
use crate::registry::LifecycleEventKind;

const PROJECT_KINDS: [LifecycleEventKind; 2] = [LifecycleEventKind::BeforeProject, LifecycleEventKind::AfterProject];

#[derive(Debug, Error)]
pub enum ProjectActionsError {
  #[error("project actions could not be isolated: {0}")]
  Isolation(#[from] CodecError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error("project actions have not been isolated yet")]
  NotIsolated,
}

/// Isolated before/after-project actions for one build.
#[derive(Debug)]
pub struct ProjectEvaluationActions {
  isolator: Arc<ActionIsolator>,
  executor: Arc<LifecycleActionExecutor>,
  encoded: Mutex<Option<EncodedActionSet>>,
}

impl ProjectEvaluationActions {
  pub fn new(isolator: Arc<ActionIsolator>, executor: Arc<LifecycleActionExecutor>) -> Self {
    Self {
      isolator,
      executor,
      encoded: Mutex::default(),
    }
  }

  fn encoded(&self) -> MutexGuard<'_, Option<EncodedActionSet>> {
    self.encoded.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Isolate the registered before/after-project actions.
  ///
  /// On success the live actions are removed from the registry; they only
  /// run through [`before_project`](Self::before_project) and
  /// [`after_project`](Self::after_project) from then on. On failure the
  /// registry is left untouched.
  pub fn isolate(&self) -> Result<(), ProjectActionsError> {
    let registry = self.executor.registry();
    let set = self.isolator.isolate_kinds(registry, &PROJECT_KINDS)?;
    for kind in PROJECT_KINDS {
      registry.clear(kind);
    }
    info!(
      action_count = set.values().map(Vec::len).sum::<usize>(),
      "isolated project evaluation actions"
    );
    *self.encoded() = Some(set);
    Ok(())
  }

  /// Install an encoded set, e.g. one loaded from the cache.
  pub fn restore(&self, set: EncodedActionSet) {
    let set = set.into_iter().filter(|(kind, _)| kind.is_per_project()).collect();
    *self.encoded() = Some(set);
  }

  pub fn is_isolated(&self) -> bool {
    self.encoded().is_some()
  }

  /// The encoded form, for persisting.
  pub fn encoded_set(&self) -> Option<EncodedActionSet> {
    self.encoded().clone()
  }

  pub fn before_project(&self, target: &mut dyn LifecycleTarget) -> Result<usize, ProjectActionsError> {
    self.run(LifecycleEventKind::BeforeProject, target)
  }

  pub fn after_project(&self, target: &mut dyn LifecycleTarget) -> Result<usize, ProjectActionsError> {
    self.run(LifecycleEventKind::AfterProject, target)
  }

  fn run(&self, kind: LifecycleEventKind, target: &mut dyn LifecycleTarget) -> Result<usize, ProjectActionsError> {
    let encoded = {
      let guard = self.encoded();
      let set = guard.as_ref().ok_or(ProjectActionsError::NotIsolated)?;
      set.get(&kind).cloned().unwrap_or_default()
    };
    if encoded.is_empty() {
      return Ok(0);
    }

    let actions = encoded
      .iter()
      .map(|bytes| self.isolator.decode_to_isolated(bytes))
      .collect::<Result<Vec<_>, _>>()?;
    debug!(kind = %kind, target = %target.describe(), count = actions.len(), "replaying project actions");
    Ok(self.executor.run_isolated(kind, &actions, target)?)
  }
}
