//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::TarryConfig;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `cache.dir`.
pub const CACHE_DIR_ENV: &str = "TARRY_CACHE_DIR";

/// Name of the configuration file looked up in a project directory.
const CONFIG_FILE: &str = "tarry.toml";

/// Loads and validates `tarry.toml` from a project directory.
///
/// Reads `<project_dir>/tarry.toml`, parses it, applies the
/// [`CACHE_DIR_ENV`] override and validates the result.
pub fn load_config(project_dir: &Path) -> Result<TarryConfig, ConfigError> {
    load_config_with(project_dir, |key| std::env::var(key).ok())
}

fn load_config_with(
    project_dir: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<TarryConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    let mut config = parse(&content)?;
    apply_env_overrides(&mut config, lookup);
    validate_config(&config)?;
    Ok(config)
}

/// Parses and validates a `tarry.toml` configuration from a string.
///
/// No environment overrides are applied, which keeps this usable in tests.
pub fn load_config_from_str(content: &str) -> Result<TarryConfig, ConfigError> {
    let config = parse(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Applies environment overrides using the given variable lookup.
pub fn apply_env_overrides(config: &mut TarryConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
        config.cache.dir = PathBuf::from(dir);
    }
}

fn parse(content: &str) -> Result<TarryConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn validate_config(config: &TarryConfig) -> Result<(), ConfigError> {
    if config.cache.dir.as_os_str().is_empty() {
        return Err(ConfigError::MissingField("cache.dir".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_CACHE_DIR;

    #[test]
    fn parse_cache_dir() {
        let toml = r#"
[cache]
dir = "/var/cache/tarry"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("/var/cache/tarry"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.cache.dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn empty_cache_table_uses_default_dir() {
        let config = load_config_from_str("[cache]\n").unwrap();
        assert_eq!(config.cache.dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn empty_dir_errors() {
        let err = load_config_from_str("[cache]\ndir = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn env_override_replaces_dir() {
        let mut config = load_config_from_str("[cache]\ndir = \"a\"\n").unwrap();
        apply_env_overrides(&mut config, |key| {
            (key == CACHE_DIR_ENV).then(|| "/tmp/override".to_string())
        });
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/override"));
    }

    #[test]
    fn empty_env_override_is_ignored() {
        let mut config = load_config_from_str("[cache]\ndir = \"a\"\n").unwrap();
        apply_env_overrides(&mut config, |_| Some(String::new()));
        assert_eq!(config.cache.dir, PathBuf::from("a"));
    }

    #[test]
    fn load_from_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tarry.toml"), "[cache]\ndir = \"results\"\n").unwrap();
        let config = load_config_with(dir.path(), |_| None).unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("results"));
    }

    #[test]
    fn load_from_project_dir_applies_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tarry.toml"), "[cache]\ndir = \"results\"\n").unwrap();
        let config = load_config_with(dir.path(), |key| {
            (key == CACHE_DIR_ENV).then(|| "/tmp/elsewhere".to_string())
        })
        .unwrap();
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/elsewhere"));
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
