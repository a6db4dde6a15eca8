//! Isolation configuration.
//!
//! Defaults come from the platform cache directory; the environment can
//! override them:
//! - `ISOLATE_CACHE_DIR`: directory holding encoded action cache entries
//! - `ISOLATE_VERIFY_CHECKSUMS`: `0` or `false` disables payload checksums

use std::path::PathBuf;

use tracing::warn;

use crate::consts::ACTIONS_CACHE_DIR;
use crate::platform::paths::cache_dir;

pub const CACHE_DIR_ENV: &str = "ISOLATE_CACHE_DIR";
pub const VERIFY_CHECKSUMS_ENV: &str = "ISOLATE_VERIFY_CHECKSUMS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationConfig {
  /// Where the file cache store keeps its entries.
  pub cache_dir: PathBuf,
  /// Check the payload checksum of every decoded action.
  pub verify_checksums: bool,
}

impl Default for IsolationConfig {
  fn default() -> Self {
    Self {
      cache_dir: Self::default_cache_dir(),
      verify_checksums: true,
    }
  }
}

impl IsolationConfig {
  pub fn default_cache_dir() -> PathBuf {
    cache_dir().join(ACTIONS_CACHE_DIR)
  }

  /// Defaults with environment overrides applied.
  pub fn from_env() -> Self {
    let mut config = Self::default();

    if let Some(path) = std::env::var_os(CACHE_DIR_ENV).filter(|path| !path.is_empty()) {
      config.cache_dir = PathBuf::from(path);
    }

    if let Ok(raw) = std::env::var(VERIFY_CHECKSUMS_ENV) {
      match parse_flag(&raw) {
        Some(verify) => config.verify_checksums = verify,
        None => warn!(var = VERIFY_CHECKSUMS_ENV, value = %raw, "ignoring unrecognised flag value"),
      }
    }

    config
  }
}

fn parse_flag(raw: &str) -> Option<bool> {
  match raw.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}
