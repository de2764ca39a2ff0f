//! Process-wide default cache directory.
//!
//! Only the outermost bootstrap code should write this. Stages and hooks that
//! carry their own cache directory never read it.

use std::path::PathBuf;

use parking_lot::{const_rwlock, RwLock};

use crate::types::{TarryConfig, DEFAULT_CACHE_DIR};

static CACHE_DIR: RwLock<Option<PathBuf>> = const_rwlock(None);

/// Returns the process default cache directory.
pub fn cache_dir() -> PathBuf {
    CACHE_DIR
        .read()
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
}

/// Sets the process default cache directory.
pub fn set_cache_dir(dir: impl Into<PathBuf>) {
    *CACHE_DIR.write() = Some(dir.into());
}

/// Restores the built-in default (`./__tarry__`).
pub fn reset_cache_dir() {
    *CACHE_DIR.write() = None;
}

/// Installs a loaded configuration as the process default.
pub fn install(config: &TarryConfig) {
    set_cache_dir(config.cache.dir.clone());
}
