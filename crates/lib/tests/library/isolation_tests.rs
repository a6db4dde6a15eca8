use std::path::PathBuf;
use std::sync::Arc;

use isolate_lib::action::Action;
use isolate_lib::codec::CodecError;
use isolate_lib::diagnostics::CollectingDiagnostics;
use isolate_lib::execute::ExecuteError;
use isolate_lib::registry::LifecycleEventKind;
use isolate_lib::services::{BuildServices, BuildTreeServices};
use isolate_lib::value::SharedValue;

use super::common::{Recorder, log, tree_services};

fn tree() -> BuildTreeServices {
  tree_services(PathBuf::from("/unused"))
}

/// Isolate everything registered in `live` and replay it in a fresh build.
fn replay_in_fresh_build(tree: &BuildTreeServices, live: &BuildServices) -> BuildServices {
  let encoded = live.isolator.isolate_registry(&live.registry).unwrap();
  let fresh = BuildServices::new(tree);
  fresh.executor.restore(fresh.isolator.decode_set(&encoded).unwrap());
  fresh
}

#[test]
fn isolated_actions_replay_in_order() {
  let tree = tree();
  let live = BuildServices::new(&tree);
  live.registry.register(LifecycleEventKind::ProjectsEvaluated, log("A"));
  live.registry.register(LifecycleEventKind::ProjectsEvaluated, log("B"));

  let fresh = replay_in_fresh_build(&tree, &live);
  let mut root = Recorder::new("root");
  let result = fresh
    .executor
    .fire(LifecycleEventKind::ProjectsEvaluated, &mut root)
    .unwrap();

  assert_eq!(root.log, vec!["A", "B"]);
  assert_eq!(result.replayed, 2);
  assert_eq!(result.live, 0);
}

#[test]
fn replay_stops_at_first_failure() {
  let tree = tree();
  let live = BuildServices::new(&tree);
  live.registry.register(LifecycleEventKind::ProjectsEvaluated, log("A"));
  live.registry.register(
    LifecycleEventKind::ProjectsEvaluated,
    Action::new("fail").labeled("settings.lua:7").with_param("boom"),
  );
  live.registry.register(LifecycleEventKind::ProjectsEvaluated, log("C"));
  let encoded = live.isolator.isolate_registry(&live.registry).unwrap();

  let sink = Arc::new(CollectingDiagnostics::new());
  let fresh = BuildServices::with_diagnostics(&tree, sink.clone());
  fresh.executor.restore(fresh.isolator.decode_set(&encoded).unwrap());

  let mut root = Recorder::new("root");
  let err = fresh
    .executor
    .fire(LifecycleEventKind::ProjectsEvaluated, &mut root)
    .unwrap_err();

  assert_eq!(root.log, vec!["A"]);
  match err {
    ExecuteError::ActionExecutionFailure { kind, index, label, source } => {
      assert_eq!(kind, LifecycleEventKind::ProjectsEvaluated);
      assert_eq!(index, 1);
      assert_eq!(label, "settings.lua:7");
      assert_eq!(source.to_string(), "boom");
    }
    other => panic!("expected action failure, got: {}", other),
  }
  assert_eq!(sink.records().len(), 1);
  assert_eq!(sink.records()[0].index, 1);
}

#[test]
fn later_mutation_of_captured_state_is_not_observed() {
  let tree = tree();
  let live = BuildServices::new(&tree);
  let greeting = SharedValue::new("hello");
  live
    .registry
    .register(LifecycleEventKind::SettingsEvaluated, Action::new("log").with_param(greeting.clone()));

  let fresh = replay_in_fresh_build(&tree, &live);
  greeting.set("changed");

  let mut settings = Recorder::new("settings");
  fresh
    .executor
    .fire(LifecycleEventKind::SettingsEvaluated, &mut settings)
    .unwrap();
  assert_eq!(settings.log, vec!["hello"]);

  let mut live_settings = Recorder::new("settings");
  live
    .executor
    .fire(LifecycleEventKind::SettingsEvaluated, &mut live_settings)
    .unwrap();
  assert_eq!(live_settings.log, vec!["changed"]);
}

#[test]
fn captured_live_handle_is_rejected_with_location() {
  let tree = tree();
  let live = BuildServices::new(&tree);
  let settings = live.registry.handle("Settings", "root");
  live.registry.register(
    LifecycleEventKind::SettingsEvaluated,
    Action::new("log")
      .labeled("settings.lua:3")
      .with_param("ok")
      .with_param(vec![settings]),
  );

  let err = live.isolator.isolate_registry(&live.registry).unwrap_err();
  assert_eq!(
    err,
    CodecError::IllegalLiveReference {
      field: "params[1][0]".to_string(),
      declared_type: "Settings".to_string(),
      site: "settings.lua:3".to_string(),
    }
  );
  assert!(!live.registry.context().is_isolating());
}

#[test]
fn isolation_of_one_registry_is_not_reentrant() {
  let tree = tree();
  let live = BuildServices::new(&tree);
  live.registry.register(LifecycleEventKind::ProjectsLoaded, log("x"));

  {
    let _guard = live.registry.context().begin().unwrap();
    let err = live.isolator.isolate_registry(&live.registry).unwrap_err();
    assert!(matches!(err, CodecError::Reentrant { .. }));
  }

  assert!(live.isolator.isolate_registry(&live.registry).is_ok());
}

#[test]
fn actions_registered_while_firing_run_with_their_kind() {
  let tree = tree();
  let live = BuildServices::new(&tree);
  live.registry.register(
    LifecycleEventKind::SettingsEvaluated,
    Action::new("defer").with_param("projects_evaluated").with_param("deferred"),
  );
  live.registry.register(LifecycleEventKind::SettingsEvaluated, log("settings"));

  let mut target = Recorder::new("root");
  live
    .executor
    .fire(LifecycleEventKind::SettingsEvaluated, &mut target)
    .unwrap();
  assert_eq!(target.log, vec!["settings"]);
  assert_eq!(live.registry.count(LifecycleEventKind::ProjectsEvaluated), 1);

  live
    .executor
    .fire(LifecycleEventKind::ProjectsEvaluated, &mut target)
    .unwrap();
  assert_eq!(target.log, vec!["settings", "deferred"]);
}
