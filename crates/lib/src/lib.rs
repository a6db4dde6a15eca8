//! isolate-lib: isolated lifecycle actions
//!
//! Build scripts register actions that run at fixed points of the
//! configuration lifecycle. This crate makes those actions safe to persist
//! and replay:
//! - `LifecycleActionRegistry`: ordered actions per event kind
//! - `ActionIsolator`: copies an action out of the live build state through
//!   the `CodecRegistry`, rejecting anything that cannot be serialized
//! - `LifecycleActionExecutor`: fires restored and live actions, fail-fast
//! - `LifecycleCache`: stores encoded action sets between invocations
//! - `ProjectEvaluationActions`: per-project replay of before/after-project
//!   actions

pub mod action;
pub mod cache;
pub mod codec;
pub mod config;
pub mod consts;
pub mod context;
pub mod diagnostics;
pub mod execute;
pub mod isolate;
pub mod platform;
pub mod project;
pub mod registry;
pub mod services;
pub mod util;
pub mod value;
