//! Service wiring.
//!
//! Codec and behavior registries are built once per build tree and shared.
//! Everything that holds isolation or execution state is created per build,
//! so a nested build never sees another build's registry or context.

use std::sync::Arc;

use crate::action::BehaviorRegistry;
use crate::cache::{FileCacheStore, LifecycleCache};
use crate::codec::CodecRegistry;
use crate::config::IsolationConfig;
use crate::diagnostics::DiagnosticsSink;
use crate::execute::LifecycleActionExecutor;
use crate::isolate::ActionIsolator;
use crate::project::ProjectEvaluationActions;
use crate::registry::LifecycleActionRegistry;

/// Services shared by every build in a build tree.
#[derive(Debug, Clone)]
pub struct BuildTreeServices {
  pub config: IsolationConfig,
  pub codecs: Arc<CodecRegistry>,
  pub behaviors: Arc<BehaviorRegistry>,
}

impl BuildTreeServices {
  /// Built-in codecs, the given behaviors and configuration from the
  /// environment.
  pub fn new(behaviors: BehaviorRegistry) -> Self {
    Self::with_config(IsolationConfig::from_env(), CodecRegistry::with_builtins(), behaviors)
  }

  pub fn with_config(config: IsolationConfig, codecs: CodecRegistry, behaviors: BehaviorRegistry) -> Self {
    let codecs = codecs.with_checksum_verification(config.verify_checksums);
    Self {
      config,
      codecs: Arc::new(codecs),
      behaviors: Arc::new(behaviors),
    }
  }

  /// A cache backed by the configured cache directory.
  pub fn file_cache(&self) -> LifecycleCache {
    let isolator = Arc::new(ActionIsolator::new(Arc::clone(&self.codecs)));
    LifecycleCache::new(isolator, Arc::new(FileCacheStore::from_config(&self.config)))
  }
}

/// Services owned by a single build.
#[derive(Debug)]
pub struct BuildServices {
  pub registry: Arc<LifecycleActionRegistry>,
  pub isolator: Arc<ActionIsolator>,
  pub executor: Arc<LifecycleActionExecutor>,
  pub project_actions: ProjectEvaluationActions,
}

impl BuildServices {
  pub fn new(tree: &BuildTreeServices) -> Self {
    Self::build(tree, LifecycleActionRegistry::new(), None)
  }

  /// Per-build services whose isolation context is named `name` in logs.
  pub fn named(tree: &BuildTreeServices, name: impl Into<String>) -> Self {
    Self::build(tree, LifecycleActionRegistry::named(name), None)
  }

  /// Per-build services reporting action failures to `diagnostics`.
  pub fn with_diagnostics(tree: &BuildTreeServices, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
    Self::build(tree, LifecycleActionRegistry::new(), Some(diagnostics))
  }

  fn build(
    tree: &BuildTreeServices,
    registry: LifecycleActionRegistry,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
  ) -> Self {
    let registry = Arc::new(registry);
    let isolator = Arc::new(ActionIsolator::new(Arc::clone(&tree.codecs)));
    let mut executor = LifecycleActionExecutor::new(Arc::clone(&registry), Arc::clone(&tree.behaviors));
    if let Some(diagnostics) = diagnostics {
      executor = executor.with_diagnostics(diagnostics);
    }
    let executor = Arc::new(executor);
    let project_actions = ProjectEvaluationActions::new(Arc::clone(&isolator), Arc::clone(&executor));

    Self {
      registry,
      isolator,
      executor,
      project_actions,
    }
  }
}
