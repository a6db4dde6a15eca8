//! Lifecycle actions and the behaviors that run them.
//!
//! An [`Action`] is a behavior tag plus the ordered parameters the user's
//! callback closed over. The tag is resolved to Rust code through the
//! [`BehaviorRegistry`] when the action fires; behaviors themselves are never
//! encoded, so an action replayed in a later invocation runs whatever code is
//! registered under its tag in that invocation.

mod behavior;

pub use behavior::*;

use anyhow::{Context, anyhow};

use crate::value::{SharedValue, Value};

/// A registered unit of user behavior.
///
/// Identity while live is reference identity; equality is only meaningful for
/// isolated copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
  behavior: String,
  label: String,
  params: Vec<Value>,
}

impl Action {
  /// Create an action running the behavior registered under `behavior`.
  ///
  /// The label defaults to the behavior tag.
  pub fn new(behavior: impl Into<String>) -> Self {
    let behavior = behavior.into();
    Self {
      label: behavior.clone(),
      behavior,
      params: Vec::new(),
    }
  }

  pub(crate) fn from_parts(behavior: String, label: String, params: Vec<Value>) -> Self {
    Self {
      behavior,
      label,
      params,
    }
  }

  /// Append a captured parameter.
  pub fn with_param(mut self, value: impl Into<Value>) -> Self {
    self.params.push(value.into());
    self
  }

  pub fn with_params<I, V>(mut self, values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    self.params.extend(values.into_iter().map(Into::into));
    self
  }

  /// Set the capture-site label reported in diagnostics, e.g.
  /// `"settings.lua:12"`.
  pub fn labeled(mut self, label: impl Into<String>) -> Self {
    self.label = label.into();
    self
  }

  pub fn behavior(&self) -> &str {
    &self.behavior
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn params(&self) -> &[Value] {
    &self.params
  }

  pub fn args(&self) -> ActionArgs<'_> {
    ActionArgs { action: self }
  }
}

/// Typed view over an action's parameters, handed to behaviors.
///
/// Reads go through shared cells, so a live action sees the current content
/// of its captured state while an isolated copy sees the snapshot taken at
/// isolation time.
#[derive(Debug, Clone, Copy)]
pub struct ActionArgs<'a> {
  action: &'a Action,
}

impl<'a> ActionArgs<'a> {
  pub fn len(&self) -> usize {
    self.action.params.len()
  }

  pub fn is_empty(&self) -> bool {
    self.action.params.is_empty()
  }

  pub fn label(&self) -> &'a str {
    &self.action.label
  }

  /// Raw parameter, without reading through shared cells.
  pub fn raw(&self, index: usize) -> Option<&'a Value> {
    self.action.params.get(index)
  }

  /// Parameter at `index`, reading through shared cells.
  pub fn value(&self, index: usize) -> anyhow::Result<Value> {
    self
      .raw(index)
      .map(Value::resolved)
      .ok_or_else(|| anyhow!("action '{}' has no parameter {}", self.action.label, index))
  }

  pub fn str(&self, index: usize) -> anyhow::Result<String> {
    let value = self.value(index)?;
    value
      .as_str()
      .map(str::to_string)
      .with_context(|| format!("parameter {} is a {}, expected string", index, value.kind_name()))
  }

  pub fn int(&self, index: usize) -> anyhow::Result<i64> {
    let value = self.value(index)?;
    value
      .as_int()
      .with_context(|| format!("parameter {} is a {}, expected int", index, value.kind_name()))
  }

  pub fn bool(&self, index: usize) -> anyhow::Result<bool> {
    let value = self.value(index)?;
    value
      .as_bool()
      .with_context(|| format!("parameter {} is a {}, expected bool", index, value.kind_name()))
  }

  pub fn action(&self, index: usize) -> anyhow::Result<Action> {
    match self.value(index)? {
      Value::Action(action) => Ok(*action),
      other => Err(anyhow!("parameter {} is a {}, expected action", index, other.kind_name())),
    }
  }

  /// The shared cell at `index`, if the parameter is live mutable state.
  ///
  /// Always `None` for isolated actions.
  pub fn shared(&self, index: usize) -> Option<&'a SharedValue> {
    match self.raw(index) {
      Some(Value::Shared(cell)) => Some(cell),
      _ => None,
    }
  }
}
