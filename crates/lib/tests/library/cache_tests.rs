use std::fs;

use isolate_lib::cache::{ActionCacheStore, CacheKey, FileCacheStore};
use isolate_lib::registry::LifecycleEventKind;
use isolate_lib::services::BuildServices;
use tempfile::TempDir;

use super::common::{Recorder, log, tree_services};

fn key() -> CacheKey {
  CacheKey::for_inputs(&["settings.lua", "build.lua", "assemble"])
}

#[test]
fn file_cache_replays_across_invocations() {
  let temp = TempDir::new().unwrap();

  // First invocation: configure live and persist.
  {
    let tree = tree_services(temp.path().join("actions"));
    let build = BuildServices::new(&tree);
    build.registry.register(LifecycleEventKind::SettingsEvaluated, log("settings"));
    build.registry.register(LifecycleEventKind::ProjectsEvaluated, log("A"));
    build.registry.register(LifecycleEventKind::ProjectsEvaluated, log("B"));
    tree.file_cache().persist(&key(), &build.registry).unwrap();
  }

  // Second invocation: nothing registered live, everything comes from disk.
  let tree = tree_services(temp.path().join("actions"));
  let build = BuildServices::new(&tree);
  assert!(tree.file_cache().restore(&key(), &build.executor).unwrap());

  let mut root = Recorder::new("root");
  build
    .executor
    .fire(LifecycleEventKind::SettingsEvaluated, &mut root)
    .unwrap();
  build
    .executor
    .fire(LifecycleEventKind::ProjectsEvaluated, &mut root)
    .unwrap();
  assert_eq!(root.log, vec!["settings", "A", "B"]);
}

#[test]
fn project_actions_replay_from_the_file_cache() {
  let temp = TempDir::new().unwrap();

  // First invocation: project actions are isolated before the build persists.
  {
    let tree = tree_services(temp.path().join("actions"));
    let build = BuildServices::new(&tree);
    build.registry.register(LifecycleEventKind::BeforeProject, log("before"));
    build.registry.register(LifecycleEventKind::AfterProject, log("after"));
    build.registry.register(LifecycleEventKind::ProjectsEvaluated, log("evaluated"));
    build.project_actions.isolate().unwrap();
    tree.file_cache().persist_build(&key(), &build).unwrap();
  }

  let tree = tree_services(temp.path().join("actions"));
  let build = BuildServices::new(&tree);
  assert!(!build.project_actions.is_isolated());
  assert!(tree.file_cache().restore_build(&key(), &build).unwrap());

  for name in [":app", ":lib"] {
    let mut project = Recorder::new(name);
    build.project_actions.before_project(&mut project).unwrap();
    build.project_actions.after_project(&mut project).unwrap();
    assert_eq!(project.log, vec!["before", "after"]);
  }

  let mut root = Recorder::new("root");
  build
    .executor
    .fire(LifecycleEventKind::ProjectsEvaluated, &mut root)
    .unwrap();
  assert_eq!(root.log, vec!["evaluated"]);
}

#[test]
fn tampered_entry_is_discarded() {
  let temp = TempDir::new().unwrap();
  let cache_dir = temp.path().join("actions");
  let tree = tree_services(cache_dir.clone());
  let cache = tree.file_cache();

  let build = BuildServices::new(&tree);
  build.registry.register(LifecycleEventKind::ProjectsLoaded, log("loaded"));
  cache.persist(&key(), &build.registry).unwrap();

  // Flip one hex digit of the stored action bytes.
  let path = cache_dir.join(format!("{}.json", key()));
  let content = fs::read_to_string(&path).unwrap();
  let mut entry: serde_json::Value = serde_json::from_str(&content).unwrap();
  let bytes = entry["entries"]["projects_loaded"][0].as_str().unwrap().to_string();
  let mut raw = hex::decode(&bytes).unwrap();
  let last = raw.len() - 3;
  raw[last] ^= 0x01;
  entry["entries"]["projects_loaded"][0] = serde_json::Value::String(hex::encode(raw));
  fs::write(&path, serde_json::to_string(&entry).unwrap()).unwrap();

  let fresh = BuildServices::new(&tree);
  assert!(!cache.restore(&key(), &fresh.executor).unwrap());
  assert!(!path.exists());
  assert_eq!(fresh.executor.restored_count(LifecycleEventKind::ProjectsLoaded), 0);
}

#[test]
fn unreadable_entry_is_a_miss() {
  let temp = TempDir::new().unwrap();
  let cache_dir = temp.path().join("actions");
  fs::create_dir_all(&cache_dir).unwrap();
  fs::write(cache_dir.join(format!("{}.json", key())), "{").unwrap();

  let tree = tree_services(cache_dir.clone());
  let build = BuildServices::new(&tree);
  assert!(!tree.file_cache().restore(&key(), &build.executor).unwrap());
  assert!(FileCacheStore::new(cache_dir).load(&key()).unwrap().is_none());
}
