//! Action isolator.
//!
//! Isolation encodes a live action through the codec registry while its
//! registry's isolation context is held, then decodes the bytes into a fresh
//! [`IsolatedAction`]. The result shares nothing with the live graph: shared
//! cells are snapshotted, live handles are either replaced by their codec's
//! stand-in or rejected.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::action::{Action, ActionArgs};
use crate::codec::{CodecError, CodecRegistry, EncodedAction};
use crate::context::{IsolationContext, IsolationGuard};
use crate::registry::{LifecycleActionRegistry, LifecycleEventKind};

/// Errors raised by isolation are codec errors.
pub type IsolationError = CodecError;

/// Encoded actions keyed by the event kind they fire for, in registration
/// order. This is the unit handed to the cache store.
pub type EncodedActionSet = BTreeMap<LifecycleEventKind, Vec<EncodedAction>>;

/// Decoded actions keyed by event kind.
pub type IsolatedActionSet = BTreeMap<LifecycleEventKind, Vec<IsolatedAction>>;

/// An action holding no live state.
///
/// Only produced by decoding, so it never contains shared cells or live
/// handles.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolatedAction(Action);

impl IsolatedAction {
  pub fn action(&self) -> &Action {
    &self.0
  }

  pub fn behavior(&self) -> &str {
    self.0.behavior()
  }

  pub fn label(&self) -> &str {
    self.0.label()
  }

  pub fn args(&self) -> ActionArgs<'_> {
    self.0.args()
  }

  pub fn into_action(self) -> Action {
    self.0
  }
}

/// Produces isolated and encoded forms of live actions.
#[derive(Debug, Clone)]
pub struct ActionIsolator {
  codecs: Arc<CodecRegistry>,
}

impl ActionIsolator {
  pub fn new(codecs: Arc<CodecRegistry>) -> Self {
    Self { codecs }
  }

  pub fn codecs(&self) -> &Arc<CodecRegistry> {
    &self.codecs
  }

  /// Isolate a single live action under `context`.
  ///
  /// Fails with [`CodecError::Reentrant`] if `context` is already isolating,
  /// and returns no partial value on any failure.
  pub fn isolate(&self, context: &IsolationContext, action: &Action) -> Result<IsolatedAction, IsolationError> {
    let guard = context.begin()?;
    let encoded = self.encode_live(&guard, action)?;
    self.decode_to_isolated(&encoded)
  }

  fn encode_live(&self, _guard: &IsolationGuard, action: &Action) -> Result<EncodedAction, IsolationError> {
    let encoded = self.codecs.encode_action(action)?;
    debug!(label = %action.label(), bytes = encoded.len(), "isolated action");
    Ok(encoded)
  }

  /// Encode an already isolated action. Needs no live context.
  pub fn encode_isolated(&self, isolated: &IsolatedAction) -> Result<EncodedAction, CodecError> {
    self.codecs.encode_action(isolated.action())
  }

  /// Decode bytes into a fresh isolated action. Needs no live context.
  pub fn decode_to_isolated(&self, encoded: &EncodedAction) -> Result<IsolatedAction, CodecError> {
    self.codecs.decode_action(encoded.as_bytes()).map(IsolatedAction)
  }

  /// Isolate every action in `registry`.
  pub fn isolate_registry(&self, registry: &LifecycleActionRegistry) -> Result<EncodedActionSet, IsolationError> {
    self.isolate_kinds(registry, &LifecycleEventKind::ALL)
  }

  /// Isolate the actions registered for `kinds` as one batch.
  ///
  /// The registry's context is held for the whole batch; the first failure
  /// aborts it and nothing is returned.
  pub fn isolate_kinds(
    &self,
    registry: &LifecycleActionRegistry,
    kinds: &[LifecycleEventKind],
  ) -> Result<EncodedActionSet, IsolationError> {
    let guard = registry.context().begin()?;
    let mut set = EncodedActionSet::new();

    for kind in kinds {
      let actions = registry.actions_for(*kind);
      if actions.is_empty() {
        continue;
      }
      let mut encoded = Vec::with_capacity(actions.len());
      for action in &actions {
        encoded.push(self.encode_live(&guard, action)?);
      }
      set.insert(*kind, encoded);
    }

    info!(
      context = %guard.context_name(),
      kind_count = set.len(),
      action_count = set.values().map(Vec::len).sum::<usize>(),
      "isolated lifecycle actions"
    );
    Ok(set)
  }

  /// Decode a whole set.
  pub fn decode_set(&self, set: &EncodedActionSet) -> Result<IsolatedActionSet, CodecError> {
    let mut decoded = IsolatedActionSet::new();
    for (kind, actions) in set {
      let isolated = actions
        .iter()
        .map(|encoded| self.decode_to_isolated(encoded))
        .collect::<Result<Vec<_>, _>>()?;
      decoded.insert(*kind, isolated);
    }
    Ok(decoded)
  }
}
