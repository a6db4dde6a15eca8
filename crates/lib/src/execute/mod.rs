//! Lifecycle action executor.
//!
//! Fires the actions for one event kind against a live target:
//! - restored isolated actions first (cache-hit replay), then live ones
//! - strictly sequential, in registration order
//! - fail-fast: the first failure stops the remaining actions of that kind
//!
//! The sequence is captured when firing starts. Actions registered while it
//! runs (even for the same kind) are picked up by the next firing of their
//! kind.

mod types;

pub use types::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::bail;
use tracing::{debug, info};

use crate::action::{Action, BehaviorRegistry};
use crate::diagnostics::{DiagnosticsSink, FailureRecord, TracingDiagnostics};
use crate::isolate::{IsolatedAction, IsolatedActionSet};
use crate::registry::{LifecycleActionRegistry, LifecycleEventKind};

/// Maximum nesting of actions run through [`FireContext::run_nested`].
const MAX_NESTED_DEPTH: usize = 64;

/// Handed to behaviors while they run.
pub struct FireContext<'a> {
  registry: &'a LifecycleActionRegistry,
  behaviors: &'a BehaviorRegistry,
  kind: LifecycleEventKind,
  index: usize,
  depth: usize,
}

impl<'a> FireContext<'a> {
  /// Event kind being fired.
  pub fn kind(&self) -> LifecycleEventKind {
    self.kind
  }

  /// Position of the running action in the fired sequence.
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn registry(&self) -> &'a LifecycleActionRegistry {
    self.registry
  }

  /// Register another action. It fires the next time `kind` is fired.
  pub fn register(&self, kind: LifecycleEventKind, action: Action) {
    self.registry.register(kind, action);
  }

  /// Run an action captured as a parameter, synchronously.
  pub fn run_nested(&mut self, action: &Action, target: &mut dyn LifecycleTarget) -> anyhow::Result<()> {
    if self.depth >= MAX_NESTED_DEPTH {
      bail!("nested action '{}' exceeds depth {}", action.label(), MAX_NESTED_DEPTH);
    }
    let Some(behavior) = self.behaviors.get(action.behavior()) else {
      bail!("nested action '{}' uses unknown behavior '{}'", action.label(), action.behavior());
    };
    let mut nested = FireContext {
      registry: self.registry,
      behaviors: self.behaviors,
      kind: self.kind,
      index: self.index,
      depth: self.depth + 1,
    };
    behavior.run(&action.args(), target, &mut nested)
  }
}

/// Fires registered and restored actions.
pub struct LifecycleActionExecutor {
  registry: Arc<LifecycleActionRegistry>,
  behaviors: Arc<BehaviorRegistry>,
  diagnostics: Arc<dyn DiagnosticsSink>,
  restored: Mutex<IsolatedActionSet>,
}

impl std::fmt::Debug for LifecycleActionExecutor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LifecycleActionExecutor")
      .field("registry", &self.registry)
      .field("behaviors", &self.behaviors)
      .finish_non_exhaustive()
  }
}

impl LifecycleActionExecutor {
  pub fn new(registry: Arc<LifecycleActionRegistry>, behaviors: Arc<BehaviorRegistry>) -> Self {
    Self {
      registry,
      behaviors,
      diagnostics: Arc::new(TracingDiagnostics),
      restored: Mutex::default(),
    }
  }

  /// Replace the diagnostics sink.
  pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
    self.diagnostics = diagnostics;
    self
  }

  pub fn registry(&self) -> &Arc<LifecycleActionRegistry> {
    &self.registry
  }

  pub fn behaviors(&self) -> &Arc<BehaviorRegistry> {
    &self.behaviors
  }

  fn restored(&self) -> MutexGuard<'_, IsolatedActionSet> {
    self.restored.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Install isolated actions decoded from a cache hit. Replaces any
  /// previously restored set.
  pub fn restore(&self, set: IsolatedActionSet) {
    info!(
      kind_count = set.len(),
      action_count = set.values().map(Vec::len).sum::<usize>(),
      "restored isolated lifecycle actions"
    );
    *self.restored() = set;
  }

  /// Number of restored actions for `kind`.
  pub fn restored_count(&self, kind: LifecycleEventKind) -> usize {
    self.restored().get(&kind).map_or(0, Vec::len)
  }

  pub fn clear_restored(&self) {
    self.restored().clear();
  }

  /// Fire every action for `kind` against `target`.
  pub fn fire(&self, kind: LifecycleEventKind, target: &mut dyn LifecycleTarget) -> Result<FireResult, ExecuteError> {
    let mut sequence: Vec<Action> = self
      .restored()
      .get(&kind)
      .map(|actions| actions.iter().map(|a| a.action().clone()).collect())
      .unwrap_or_default();
    let replayed = sequence.len();
    sequence.extend(self.registry.actions_for(kind));

    let result = FireResult {
      kind,
      replayed,
      live: sequence.len() - replayed,
    };

    if sequence.is_empty() {
      debug!(kind = %kind, "no actions registered");
      return Ok(result);
    }

    info!(
      kind = %kind,
      target = %target.describe(),
      replayed = result.replayed,
      live = result.live,
      "firing lifecycle actions"
    );
    self.run_sequence(kind, &sequence, target)?;
    Ok(result)
  }

  /// Run a sequence of isolated actions for `kind`, outside the registry.
  pub fn run_isolated(
    &self,
    kind: LifecycleEventKind,
    actions: &[IsolatedAction],
    target: &mut dyn LifecycleTarget,
  ) -> Result<usize, ExecuteError> {
    let sequence: Vec<Action> = actions.iter().map(|a| a.action().clone()).collect();
    self.run_sequence(kind, &sequence, target)
  }

  fn run_sequence(
    &self,
    kind: LifecycleEventKind,
    actions: &[Action],
    target: &mut dyn LifecycleTarget,
  ) -> Result<usize, ExecuteError> {
    for (index, action) in actions.iter().enumerate() {
      let Some(behavior) = self.behaviors.get(action.behavior()) else {
        let err = ExecuteError::UnknownBehavior {
          kind,
          index,
          label: action.label().to_string(),
          tag: action.behavior().to_string(),
        };
        self.report(kind, index, action, err.to_string());
        return Err(err);
      };

      debug!(kind = %kind, index, label = %action.label(), "running action");
      let mut cx = FireContext {
        registry: &self.registry,
        behaviors: &self.behaviors,
        kind,
        index,
        depth: 0,
      };

      if let Err(source) = behavior.run(&action.args(), target, &mut cx) {
        self.report(kind, index, action, format!("{:#}", source));
        return Err(ExecuteError::ActionExecutionFailure {
          kind,
          index,
          label: action.label().to_string(),
          source,
        });
      }
    }
    Ok(actions.len())
  }

  fn report(&self, kind: LifecycleEventKind, index: usize, action: &Action, cause: String) {
    self.diagnostics.report(&FailureRecord {
      kind,
      index,
      label: action.label().to_string(),
      cause,
    });
  }
}
