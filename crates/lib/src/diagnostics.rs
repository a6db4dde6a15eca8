//! Failure reporting for fired lifecycle actions.
//!
//! The executor hands every failure to a [`DiagnosticsSink`] as a structured
//! [`FailureRecord`]; formatting for users is the host's job.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::error;

use crate::registry::LifecycleEventKind;

/// A failed action, identified by event kind and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
  pub kind: LifecycleEventKind,
  pub index: usize,
  pub label: String,
  pub cause: String,
}

/// Receives failure records.
pub trait DiagnosticsSink: Send + Sync {
  fn report(&self, record: &FailureRecord);
}

/// Default sink: logs each record at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
  fn report(&self, record: &FailureRecord) {
    error!(
      kind = %record.kind,
      index = record.index,
      label = %record.label,
      cause = %record.cause,
      "lifecycle action failed"
    );
  }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
  records: Mutex<Vec<FailureRecord>>,
}

impl CollectingDiagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> Vec<FailureRecord> {
    self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl DiagnosticsSink for CollectingDiagnostics {
  fn report(&self, record: &FailureRecord) {
    self
      .records
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(record.clone());
  }
}
