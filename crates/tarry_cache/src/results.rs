//! Content-addressed store of stage results.

use std::path::{Path, PathBuf};

use tarry_common::ContentHash;

use crate::error::CacheError;
use crate::object::ObjectStore;
use crate::record::PersistedInvocation;

/// Subdirectory holding one record per stage hash.
const RESULTS_DIR: &str = "stage_results";

/// Maps stage hashes to persisted invocation records.
///
/// Records are sharded by the first two hex digits of the hash:
/// `stage_results/<hex[0:2]>/<hex[2:]>`.
#[derive(Debug, Clone)]
pub struct ResultStore {
    objects: ObjectStore,
}

impl ResultStore {
    /// Creates a result store below the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            objects: ObjectStore::new(cache_dir),
        }
    }

    /// Returns the record path relative to the cache directory.
    pub fn record_path(hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        let (shard, rest) = hex.split_at(2);
        Path::new(RESULTS_DIR).join(shard).join(rest)
    }

    /// Returns the absolute location of the record for `hash`.
    pub fn location(&self, hash: &ContentHash) -> PathBuf {
        self.objects.object_path(&Self::record_path(hash))
    }

    /// Persists a record under its stage hash.
    pub fn save(&self, hash: &ContentHash, record: &PersistedInvocation) -> Result<(), CacheError> {
        self.objects.save_object(&Self::record_path(hash), record)
    }

    /// Loads the record for a stage hash, or `None` on a cache miss.
    pub fn load(&self, hash: &ContentHash) -> Option<PersistedInvocation> {
        self.objects.load_object(&Self::record_path(hash))
    }

    /// Returns `true` if a valid record exists for `hash`.
    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.load(hash).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PersistedArg;
    use std::collections::BTreeMap;
    use std::time::{Duration, SystemTime};
    use tarry_common::Value;

    fn record(result: i64) -> PersistedInvocation {
        let mut args = BTreeMap::new();
        let half = Value::Int(result / 2);
        args.insert("x".to_string(), PersistedArg::Literal(half));
        PersistedInvocation {
            result: Value::Int(result),
            args,
            code_hash: ContentHash::from_bytes(b"code"),
            start_time: SystemTime::now(),
            duration: Duration::from_micros(5),
        }
    }

    #[test]
    fn record_path_is_sharded() {
        let hash = ContentHash::from_bytes(b"abc");
        let hex = hash.to_hex();
        let path = ResultStore::record_path(&hash);
        assert_eq!(
            path,
            Path::new("stage_results").join(&hex[..2]).join(&hex[2..])
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let hash = ContentHash::from_bytes(b"stage");
        store.save(&hash, &record(2)).unwrap();

        let loaded = store.load(&hash).unwrap();
        assert_eq!(loaded.result, Value::Int(2));
        assert_eq!(loaded.args["x"], PersistedArg::Literal(Value::Int(1)));
        assert!(store.location(&hash).is_file());
    }

    #[test]
    fn missing_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        assert!(store.load(&ContentHash::from_bytes(b"never")).is_none());
        assert!(!store.contains(&ContentHash::from_bytes(b"never")));
    }

    #[test]
    fn corrupt_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        let hash = ContentHash::from_bytes(b"stage");
        store.save(&hash, &record(4)).unwrap();

        std::fs::write(store.location(&hash), b"scribbled over").unwrap();
        assert!(store.load(&hash).is_none());
    }

    #[test]
    fn stores_are_isolated_by_directory() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let hash = ContentHash::from_bytes(b"stage");
        ResultStore::new(a.path()).save(&hash, &record(6)).unwrap();
        assert!(ResultStore::new(a.path()).contains(&hash));
        assert!(!ResultStore::new(b.path()).contains(&hash));
    }
}
