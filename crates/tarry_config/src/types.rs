//! Configuration types deserialized from `tarry.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// Cache directory used when nothing else is configured.
pub const DEFAULT_CACHE_DIR: &str = "./__tarry__";

/// The top-level configuration parsed from `tarry.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TarryConfig {
    /// Where stage results and hook states are persisted.
    #[serde(default)]
    pub cache: CacheSettings,
}

/// The `[cache]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheSettings {
    /// Root of the on-disk store (`stage_results/` and `hook_states/` live below it).
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}
