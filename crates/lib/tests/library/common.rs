use std::any::Any;
use std::path::PathBuf;

use anyhow::bail;
use isolate_lib::action::{Action, BehaviorRegistry};
use isolate_lib::codec::CodecRegistry;
use isolate_lib::config::IsolationConfig;
use isolate_lib::execute::{LifecycleTarget, downcast_target};
use isolate_lib::project::ProjectPath;
use isolate_lib::registry::LifecycleEventKind;
use isolate_lib::services::BuildTreeServices;

/// A settings object or project that records what actions did to it.
#[derive(Debug, Default)]
pub struct Recorder {
  pub name: String,
  pub log: Vec<String>,
}

impl Recorder {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      log: Vec::new(),
    }
  }
}

impl LifecycleTarget for Recorder {
  fn describe(&self) -> String {
    format!("recorder '{}'", self.name)
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }
}

/// `log(msg)`, `fail(msg)`, `log_path(ProjectPath)`, `defer(kind, msg)` and
/// `sum(list)`.
pub fn behaviors() -> BehaviorRegistry {
  let mut behaviors = BehaviorRegistry::new();
  behaviors
    .register("log", |args, target, _| {
      let message = args.str(0)?;
      downcast_target::<Recorder>(target)?.log.push(message);
      Ok(())
    })
    .register("fail", |args, _, _| bail!("{}", args.str(0)?))
    .register("log_path", |args, target, _| {
      let value = args.value(0)?;
      let Some(path) = ProjectPath::from_value(&value) else {
        bail!("parameter 0 is a {}, expected ProjectPath", value.kind_name());
      };
      downcast_target::<Recorder>(target)?.log.push(path.to_string());
      Ok(())
    })
    .register("defer", |args, _, cx| {
      let kind: LifecycleEventKind = args.str(0)?.parse()?;
      cx.register(kind, Action::new("log").with_param(args.str(1)?));
      Ok(())
    })
    .register("sum", |args, target, _| {
      let value = args.value(0)?;
      let Some(items) = value.as_list() else {
        bail!("expected a list");
      };
      let total: i64 = items.iter().filter_map(|v| v.as_int()).sum();
      downcast_target::<Recorder>(target)?.log.push(total.to_string());
      Ok(())
    });
  behaviors
}

pub fn log(message: &str) -> Action {
  Action::new("log").with_param(message)
}

pub fn tree_services(cache_dir: PathBuf) -> BuildTreeServices {
  let config = IsolationConfig {
    cache_dir,
    verify_checksums: true,
  };
  BuildTreeServices::with_config(config, CodecRegistry::with_builtins(), behaviors())
}
