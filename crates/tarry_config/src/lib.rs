//! Parsing and validation of `tarry.toml` and the process-wide cache location.
//!
//! Stages and hooks take their cache directory either from an explicit
//! per-instance override or from the process default managed by [`global`].
//! The default is meant to be set once, at bootstrap, from a loaded
//! [`TarryConfig`].

#![warn(missing_docs)]

pub mod error;
pub mod global;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use global::{cache_dir, install, reset_cache_dir, set_cache_dir};
pub use loader::{apply_env_overrides, load_config, load_config_from_str, CACHE_DIR_ENV};
pub use types::*;
