//! Crate-wide constants.

/// Application name used for platform directories.
pub const APP_NAME: &str = "isolate";

/// Number of hex characters kept from a SHA-256 digest for cache keys.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Version of the encoded action byte layout.
///
/// Bump whenever the encoded tree changes shape; entries written with another
/// version are rejected as corrupt and re-created from live configuration.
pub const ENCODING_VERSION: u32 = 1;

/// Version of the on-disk cache entry format written by the file store.
pub const CACHE_ENTRY_VERSION: u32 = 1;

/// Subdirectory of the cache directory holding encoded action entries.
pub const ACTIONS_CACHE_DIR: &str = "actions";

/// Deepest nesting of lists, maps, objects and nested actions an action
/// parameter may have.
///
/// Deeper values fail to encode with an `InvalidValue` error instead of
/// producing bytes that cannot be read back.
pub const MAX_NESTING_DEPTH: usize = 32;
