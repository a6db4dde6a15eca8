//! Test utilities for isolate-lib.
//!
//! A recording lifecycle target and a behavior set covering the common
//! action shapes used across unit tests.

use std::any::Any;
use std::str::FromStr;

use anyhow::bail;

use crate::action::{Action, BehaviorRegistry};
use crate::execute::{LifecycleTarget, downcast_target};
use crate::registry::LifecycleEventKind;

/// Target that records every message logged against it.
#[derive(Debug, Default)]
pub struct RecordingTarget {
  pub name: String,
  pub log: Vec<String>,
}

impl RecordingTarget {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      log: Vec::new(),
    }
  }
}

impl LifecycleTarget for RecordingTarget {
  fn describe(&self) -> String {
    format!("target '{}'", self.name)
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }
}

/// Behaviors used by unit tests:
///
/// - `log(msg)`: append `msg` to the target's log
/// - `fail(msg)`: fail with `msg`
/// - `register_log(kind, msg)`: register `log(msg)` for `kind`
/// - `run(action)`: run a nested action
pub fn test_behaviors() -> BehaviorRegistry {
  let mut behaviors = BehaviorRegistry::new();
  behaviors
    .register("log", |args, target, _| {
      let message = args.str(0)?;
      downcast_target::<RecordingTarget>(target)?.log.push(message);
      Ok(())
    })
    .register("fail", |args, _, _| bail!("{}", args.str(0)?))
    .register("register_log", |args, _, cx| {
      let kind = LifecycleEventKind::from_str(&args.str(0)?)?;
      cx.register(kind, Action::new("log").with_param(args.str(1)?));
      Ok(())
    })
    .register("run", |args, target, cx| {
      let nested = args.action(0)?;
      cx.run_nested(&nested, target)
    });
  behaviors
}
