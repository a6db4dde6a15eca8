use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::ActionArgs;
use crate::execute::{FireContext, LifecycleTarget};

/// Executable code bound to a behavior tag.
pub trait Behavior: Send + Sync {
  fn run(
    &self,
    args: &ActionArgs<'_>,
    target: &mut dyn LifecycleTarget,
    cx: &mut FireContext<'_>,
  ) -> anyhow::Result<()>;
}

struct FnBehavior<F>(F);

impl<F> Behavior for FnBehavior<F>
where
  F: Fn(&ActionArgs<'_>, &mut dyn LifecycleTarget, &mut FireContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
  fn run(
    &self,
    args: &ActionArgs<'_>,
    target: &mut dyn LifecycleTarget,
    cx: &mut FireContext<'_>,
  ) -> anyhow::Result<()> {
    (self.0)(args, target, cx)
  }
}

/// Maps behavior tags to executable code.
///
/// Built once per build tree and shared read-only afterwards.
#[derive(Default, Clone)]
pub struct BehaviorRegistry {
  behaviors: HashMap<String, Arc<dyn Behavior>>,
}

impl BehaviorRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a closure under `tag`, replacing any previous binding.
  pub fn register<F>(&mut self, tag: impl Into<String>, f: F) -> &mut Self
  where
    F: Fn(&ActionArgs<'_>, &mut dyn LifecycleTarget, &mut FireContext<'_>) -> anyhow::Result<()>
      + Send
      + Sync
      + 'static,
  {
    self.behaviors.insert(tag.into(), Arc::new(FnBehavior(f)));
    self
  }

  /// Register a behavior implementation under `tag`.
  pub fn register_behavior(&mut self, tag: impl Into<String>, behavior: Arc<dyn Behavior>) -> &mut Self {
    self.behaviors.insert(tag.into(), behavior);
    self
  }

  pub fn get(&self, tag: &str) -> Option<Arc<dyn Behavior>> {
    self.behaviors.get(tag).cloned()
  }

  pub fn contains(&self, tag: &str) -> bool {
    self.behaviors.contains_key(tag)
  }

  /// Registered tags, sorted.
  pub fn tags(&self) -> Vec<&str> {
    let mut tags: Vec<&str> = self.behaviors.keys().map(String::as_str).collect();
    tags.sort_unstable();
    tags
  }
}

impl fmt::Debug for BehaviorRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BehaviorRegistry").field("tags", &self.tags()).finish()
  }
}
