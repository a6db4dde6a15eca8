use std::sync::Arc;

use isolate_lib::action::Action;
use isolate_lib::codec::{CodecError, CodecRegistry, HandleIdentityCodec};
use isolate_lib::consts::MAX_NESTING_DEPTH;
use isolate_lib::context::IsolationContext;
use isolate_lib::isolate::ActionIsolator;
use isolate_lib::project::ProjectPath;
use isolate_lib::value::{SharedValue, Value};
use proptest::prelude::*;

fn plain_value() -> impl Strategy<Value = Value> {
  let leaf = prop_oneof![
    Just(Value::Null),
    any::<bool>().prop_map(Value::Bool),
    any::<i64>().prop_map(Value::Int),
    (-1.0e12..1.0e12f64).prop_map(Value::Float),
    "[a-z0-9 :]{0,12}".prop_map(Value::Str),
    "[a-z]{1,8}".prop_map(|name| Value::from(ProjectPath::root().child(&name).unwrap())),
  ];
  leaf.prop_recursive(8, 64, 6, |inner| {
    prop_oneof![
      prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
      prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..6).prop_map(Value::Map),
      prop::collection::vec(inner, 0..4).prop_map(|params| Value::from(Action::new("log").with_params(params))),
    ]
  })
}

/// A live value paired with what its isolated copy must look like: shared
/// cells replaced by their content and `Project` handles by their path.
fn live_value() -> impl Strategy<Value = (Value, Value)> {
  let leaf = prop_oneof![
    plain_value().prop_map(|v| (v.clone(), v)),
    "[a-z]{1,8}".prop_map(|name| {
      let path = ProjectPath::root().child(&name).unwrap();
      let handle = IsolationContext::new().handle("Project", path.to_string());
      (Value::Handle(handle), Value::from(path))
    }),
  ];
  leaf.prop_recursive(6, 48, 4, |inner| {
    prop_oneof![
      inner
        .clone()
        .prop_map(|(live, expected)| (Value::Shared(SharedValue::new(live)), expected)),
      prop::collection::vec(inner.clone(), 0..4).prop_map(|pairs| {
        let (live, expected): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        (Value::List(live), Value::List(expected))
      }),
      prop::collection::vec(inner, 0..4).prop_map(|pairs| {
        let (live, expected): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        (
          Value::from(Action::new("log").with_params(live)),
          Value::from(Action::new("log").with_params(expected)),
        )
      }),
    ]
  })
}

fn codecs_with_handles() -> CodecRegistry {
  let mut codecs = CodecRegistry::with_builtins();
  codecs.register(Arc::new(HandleIdentityCodec::project_path()));
  codecs
}

proptest! {
  #[test]
  fn values_survive_encoding(value in plain_value()) {
    let codecs = CodecRegistry::with_builtins();
    let bytes = codecs.encode(&value, "roundtrip").unwrap();
    prop_assert_eq!(codecs.decode(&bytes).unwrap(), value);
  }

  #[test]
  fn actions_survive_encoding(params in prop::collection::vec(plain_value(), 0..5), label in "[a-z.]{1,10}:[0-9]{1,3}") {
    let codecs = CodecRegistry::with_builtins();
    let action = Action::new("log").labeled(label).with_params(params);
    let encoded = codecs.encode_action(&action).unwrap();
    let decoded = codecs.decode_action(encoded.as_bytes()).unwrap();
    prop_assert_eq!(&decoded, &action);
    prop_assert_eq!(codecs.encode_action(&decoded).unwrap(), encoded);
  }

  #[test]
  fn live_state_is_replaced_by_its_snapshot(pairs in prop::collection::vec(live_value(), 0..4)) {
    let (live, expected): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
    let action = Action::new("log").labeled("live.lua:1").with_params(live);

    let isolator = ActionIsolator::new(Arc::new(codecs_with_handles()));
    let isolated = isolator.isolate(&IsolationContext::new(), &action).unwrap();
    prop_assert_eq!(isolated.action(), &Action::new("log").labeled("live.lua:1").with_params(expected));
    prop_assert!(!isolated.action().params().iter().any(Value::is_live));
  }
}

fn nested_lists(depth: usize) -> Value {
  (0..depth).fold(Value::from("leaf"), |inner, _| Value::List(vec![inner]))
}

#[test]
fn deepest_allowed_nesting_survives_isolation() {
  // The nested action counts as one level, the lists fill the rest.
  let live = Action::new("defer").with_param(Value::Shared(SharedValue::new(nested_lists(MAX_NESTING_DEPTH - 1))));
  let action = Action::new("log").labeled("deep.lua:1").with_param(live);
  let expected = Action::new("log")
    .labeled("deep.lua:1")
    .with_param(Action::new("defer").with_param(nested_lists(MAX_NESTING_DEPTH - 1)));

  let isolator = ActionIsolator::new(Arc::new(CodecRegistry::with_builtins()));
  let isolated = isolator.isolate(&IsolationContext::new(), &action).unwrap();
  assert_eq!(isolated.action(), &expected);

  let encoded = isolator.encode_isolated(&isolated).unwrap();
  assert_eq!(isolator.decode_to_isolated(&encoded).unwrap().action(), &expected);
}

#[test]
fn one_level_too_deep_fails_without_corruption() {
  let live = Action::new("defer").with_param(Value::Shared(SharedValue::new(nested_lists(MAX_NESTING_DEPTH))));
  let action = Action::new("log").labeled("deep.lua:2").with_param(live);

  let isolator = ActionIsolator::new(Arc::new(CodecRegistry::with_builtins()));
  let err = isolator.isolate(&IsolationContext::new(), &action).unwrap_err();
  assert!(!err.is_corrupt());
  assert!(matches!(err, CodecError::InvalidValue { ref site, .. } if site.starts_with("deep.lua:2")));
}
