//! Persisting isolated lifecycle actions across invocations.
//!
//! On a cache miss the host configures live, then [`LifecycleCache::persist`]
//! isolates and stores every registered action. On a hit,
//! [`LifecycleCache::restore`] decodes the stored set into the executor, which
//! replays it before any live actions. [`LifecycleCache::persist_build`] and
//! [`LifecycleCache::restore_build`] do the same for a whole build, carrying
//! the isolated before/after-project actions too. Entries that no longer
//! decode are invalidated and reported as a miss.

mod storage;
mod types;

pub use storage::*;
pub use types::*;

use std::sync::Arc;

use tracing::{info, warn};

use crate::execute::LifecycleActionExecutor;
use crate::isolate::{ActionIsolator, EncodedActionSet, IsolatedActionSet};
use crate::registry::LifecycleActionRegistry;
use crate::services::BuildServices;

/// Coordinates the isolator, a cache store and an executor.
pub struct LifecycleCache {
  isolator: Arc<ActionIsolator>,
  store: Arc<dyn ActionCacheStore>,
}

impl std::fmt::Debug for LifecycleCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LifecycleCache")
      .field("isolator", &self.isolator)
      .finish_non_exhaustive()
  }
}

impl LifecycleCache {
  pub fn new(isolator: Arc<ActionIsolator>, store: Arc<dyn ActionCacheStore>) -> Self {
    Self { isolator, store }
  }

  pub fn store(&self) -> &Arc<dyn ActionCacheStore> {
    &self.store
  }

  /// Isolate every action in `registry` and store the set under `key`.
  ///
  /// Nothing is written if isolation fails.
  pub fn persist(&self, key: &CacheKey, registry: &LifecycleActionRegistry) -> Result<EncodedActionSet, CacheError> {
    let set = self.isolator.isolate_registry(registry)?;
    self.write(key, set)
  }

  /// Like [`persist`](Self::persist) for a whole build, including the
  /// before/after-project actions its [`ProjectEvaluationActions`] already
  /// took out of the registry.
  ///
  /// [`ProjectEvaluationActions`]: crate::project::ProjectEvaluationActions
  pub fn persist_build(&self, key: &CacheKey, build: &BuildServices) -> Result<EncodedActionSet, CacheError> {
    let mut set = self.isolator.isolate_registry(&build.registry)?;
    if let Some(project) = build.project_actions.encoded_set() {
      for (kind, mut actions) in project {
        actions.extend(set.remove(&kind).unwrap_or_default());
        set.insert(kind, actions);
      }
    }
    self.write(key, set)
  }

  /// Load the set stored under `key` into `executor`.
  ///
  /// Returns `Ok(false)` on a miss, including when the stored entry turned
  /// out to be corrupt (it is invalidated first).
  pub fn restore(&self, key: &CacheKey, executor: &LifecycleActionExecutor) -> Result<bool, CacheError> {
    let Some((_, decoded)) = self.load(key)? else {
      return Ok(false);
    };
    executor.restore(decoded);
    Ok(true)
  }

  /// Load the set stored under `key` into a fresh build.
  ///
  /// Before/after-project actions go to the build's project actions, so
  /// `before_project` and `after_project` replay them; every other kind goes
  /// to the executor. Misses and corrupt entries behave as in
  /// [`restore`](Self::restore).
  pub fn restore_build(&self, key: &CacheKey, build: &BuildServices) -> Result<bool, CacheError> {
    let Some((encoded, mut decoded)) = self.load(key)? else {
      return Ok(false);
    };
    decoded.retain(|kind, _| !kind.is_per_project());
    build.executor.restore(decoded);
    build.project_actions.restore(encoded);
    Ok(true)
  }

  fn write(&self, key: &CacheKey, set: EncodedActionSet) -> Result<EncodedActionSet, CacheError> {
    self.store.store(key, &set)?;
    info!(
      key = %key,
      action_count = set.values().map(Vec::len).sum::<usize>(),
      "persisted lifecycle actions"
    );
    Ok(set)
  }

  /// The stored set and its decoded form, or `None` on a miss.
  fn load(&self, key: &CacheKey) -> Result<Option<(EncodedActionSet, IsolatedActionSet)>, CacheError> {
    let set = match self.store.load(key) {
      Ok(Some(set)) => set,
      Ok(None) => {
        info!(key = %key, "no cached lifecycle actions");
        return Ok(None);
      }
      Err(e) if e.is_corrupt() => return self.discard(key, &e).map(|()| None),
      Err(e) => return Err(e.into()),
    };

    match self.isolator.decode_set(&set) {
      Ok(decoded) => Ok(Some((set, decoded))),
      Err(e) if e.is_corrupt() => self.discard(key, &e).map(|()| None),
      Err(e) => Err(e.into()),
    }
  }

  fn discard(&self, key: &CacheKey, cause: &dyn std::error::Error) -> Result<(), CacheError> {
    warn!(key = %key, error = %cause, "discarding corrupt cache entry");
    self.store.invalidate(key)?;
    Ok(())
  }
}
