use std::path::PathBuf;
use std::sync::Arc;

use isolate_lib::action::Action;
use isolate_lib::codec::{CodecRegistry, HandleIdentityCodec};
use isolate_lib::config::IsolationConfig;
use isolate_lib::project::{ProjectActionsError, ProjectDescriptor, ProjectDescriptorRegistry, ProjectPath};
use isolate_lib::registry::LifecycleEventKind;
use isolate_lib::services::{BuildServices, BuildTreeServices};

use super::common::{Recorder, behaviors, log};

fn tree_with_project_handles() -> BuildTreeServices {
  let mut codecs = CodecRegistry::with_builtins();
  codecs.register(Arc::new(HandleIdentityCodec::project_path()));
  let config = IsolationConfig {
    cache_dir: PathBuf::from("/unused"),
    verify_checksums: true,
  };
  BuildTreeServices::with_config(config, codecs, behaviors())
}

#[test]
fn each_project_replays_before_and_after_actions() {
  let tree = tree_with_project_handles();
  let build = BuildServices::new(&tree);
  let root = build.registry.handle("Project", ":");
  build.registry.register(
    LifecycleEventKind::BeforeProject,
    Action::new("log_path").with_param(root),
  );
  build.registry.register(LifecycleEventKind::AfterProject, log("evaluated"));
  build.project_actions.isolate().unwrap();

  for name in [":app", ":lib"] {
    let mut project = Recorder::new(name);
    build.project_actions.before_project(&mut project).unwrap();
    build.project_actions.after_project(&mut project).unwrap();
    assert_eq!(project.log, vec![":", "evaluated"]);
  }

  // The live registry no longer fires them directly.
  let mut other = Recorder::new(":other");
  let result = build
    .executor
    .fire(LifecycleEventKind::BeforeProject, &mut other)
    .unwrap();
  assert_eq!(result.total(), 0);
}

#[test]
fn project_failure_reports_index() {
  let tree = tree_with_project_handles();
  let build = BuildServices::new(&tree);
  build.registry.register(LifecycleEventKind::AfterProject, log("A"));
  build
    .registry
    .register(LifecycleEventKind::AfterProject, Action::new("sum").with_param("not a list"));
  build.project_actions.isolate().unwrap();

  let mut project = Recorder::new(":app");
  let err = build.project_actions.after_project(&mut project).unwrap_err();
  match err {
    ProjectActionsError::Execute(e) => {
      assert_eq!(e.index(), 1);
      assert_eq!(e.kind(), LifecycleEventKind::AfterProject);
    }
    other => panic!("expected execution failure, got: {}", other),
  }
  assert_eq!(project.log, vec!["A"]);
}

#[test]
fn nested_builds_isolate_independently() {
  let tree = tree_with_project_handles();
  let outer = BuildServices::named(&tree, "outer");
  let nested = BuildServices::named(&tree, "nested");
  outer.registry.register(LifecycleEventKind::BeforeProject, log("outer"));
  nested.registry.register(LifecycleEventKind::BeforeProject, log("nested"));

  let _outer_guard = outer.registry.context().begin().unwrap();
  nested.project_actions.isolate().unwrap();

  let mut project = Recorder::new(":app");
  nested.project_actions.before_project(&mut project).unwrap();
  assert_eq!(project.log, vec!["nested"]);
  assert!(!outer.project_actions.is_isolated());
}

#[test]
fn descriptor_moves_keep_the_project() {
  let mut registry = ProjectDescriptorRegistry::new();
  let app = ProjectPath::parse(":app").unwrap();
  registry.add(ProjectDescriptor::new(ProjectPath::root(), "/work")).unwrap();
  registry.add(ProjectDescriptor::new(app.clone(), "/work/app")).unwrap();

  let moved = ProjectPath::root().child("apps").unwrap().child("app").unwrap();
  registry.change_descriptor_path(&app, moved.clone()).unwrap();

  let descriptor = registry.get(&moved).unwrap();
  assert_eq!(descriptor.path.to_string(), ":apps:app");
  assert_eq!(descriptor.dir, PathBuf::from("/work/app"));
  assert!(registry.get(&app).is_none());
  assert_eq!(registry.len(), 2);
}
