//! Process default cache directory from a configuration file.

use tarry::{function, Args, CallArgs, Stage, TarryResult, Value};

// The only test in this binary touching the process-wide cache directory.
#[test]
fn installed_config_sets_default_cache_dir() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let contents = format!("[cache]\ndir = '{}'\n", cache.display());
    std::fs::write(dir.path().join("tarry.toml"), contents).unwrap();

    let config = tarry::load_config(dir.path()).unwrap();
    tarry::install(&config);
    assert_eq!(tarry::cache_dir(), cache);

    let answer = function!(
        fn answer(_args: &CallArgs) -> TarryResult<Value> {
            Ok(Value::Int(42))
        }
    );
    let stage = Stage::new(answer).unwrap();
    let (hash, _) = stage.compute_or_load(&Args::new()).unwrap();
    let hex = hash.to_hex();
    let results = cache.join("stage_results");
    assert!(results.join(&hex[..2]).join(&hex[2..]).is_file());

    tarry::reset_cache_dir();
    assert_ne!(tarry::cache_dir(), cache);
}
