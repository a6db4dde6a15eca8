//! Isolation context: the "isolation in progress" flag for one registry.
//!
//! Each [`LifecycleActionRegistry`](crate::registry::LifecycleActionRegistry)
//! owns exactly one context, so nested builds with their own registries never
//! observe each other's isolation. A context hands out [`LiveHandle`]s bound
//! to its scope; those handles refuse to be dereferenced while an
//! [`IsolationGuard`] is alive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::codec::CodecError;
use crate::value::LiveHandle;

/// Shared flag observed by live handles.
#[derive(Debug, Clone, Default)]
pub struct IsolationScope {
  in_progress: Arc<AtomicBool>,
}

impl IsolationScope {
  pub fn is_isolating(&self) -> bool {
    self.in_progress.load(Ordering::Acquire)
  }
}

/// Per-registry isolation state.
#[derive(Debug, Clone)]
pub struct IsolationContext {
  name: String,
  scope: IsolationScope,
}

impl Default for IsolationContext {
  fn default() -> Self {
    Self::new()
  }
}

impl IsolationContext {
  pub fn new() -> Self {
    Self::named("build")
  }

  /// Create a context with a name used in log output.
  pub fn named(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      scope: IsolationScope::default(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_isolating(&self) -> bool {
    self.scope.is_isolating()
  }

  /// Mark isolation as in progress.
  ///
  /// Fails with [`CodecError::Reentrant`] if another attempt already holds
  /// the context. The flag is cleared when the returned guard is dropped.
  pub fn begin(&self) -> Result<IsolationGuard, CodecError> {
    self
      .scope
      .in_progress
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .map_err(|_| CodecError::Reentrant {
        context: self.name.clone(),
      })?;
    debug!(context = %self.name, "isolation started");
    Ok(IsolationGuard {
      name: self.name.clone(),
      scope: self.scope.clone(),
    })
  }

  /// Create a live handle bound to this context.
  pub fn handle(&self, type_name: impl Into<String>, id: impl Into<String>) -> LiveHandle {
    LiveHandle::new(type_name, id, self.scope.clone())
  }
}

/// Proof that isolation is in progress. Releases the context on drop.
#[derive(Debug)]
pub struct IsolationGuard {
  name: String,
  scope: IsolationScope,
}

impl IsolationGuard {
  pub fn context_name(&self) -> &str {
    &self.name
  }
}

impl Drop for IsolationGuard {
  fn drop(&mut self) {
    self.scope.in_progress.store(false, Ordering::Release);
    debug!(context = %self.name, "isolation finished");
  }
}
