//! Durable per-hook trigger state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tarry_common::ContentHash;

use crate::error::CacheError;
use crate::object::ObjectStore;

/// Subdirectory holding one state file per hook.
const HOOK_STATES_DIR: &str = "hook_states";

/// Longest file name most filesystems accept.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Trigger history of one subscribed hook argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookArgumentState {
    /// Stage hash most recently used to load this argument.
    pub lookup_reference: Option<ContentHash>,
    /// Stage hash most recently used to trigger the hook.
    pub last_result_hash: Option<ContentHash>,
    /// Every stage hash that has ever triggered the hook.
    pub all_result_hashes: BTreeSet<ContentHash>,
}

/// Durable state of one hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookState {
    /// Aggregate code hash of the hook when the state was last written.
    pub code_hash: Option<ContentHash>,
    /// Per-argument history, keyed by parameter name.
    pub arg_states: BTreeMap<String, HookArgumentState>,
}

impl HookState {
    /// Records the hook's current aggregate code hash.
    ///
    /// When it differs from the stored one, every argument's trigger history
    /// is cleared; lookup references survive. Returns `true` on a change.
    pub fn update_code_hash(&mut self, code_hash: ContentHash) -> bool {
        if self.code_hash == Some(code_hash) {
            return false;
        }
        for state in self.arg_states.values_mut() {
            state.last_result_hash = None;
            state.all_result_hashes.clear();
        }
        self.code_hash = Some(code_hash);
        true
    }

    /// Returns the state of `arg`, creating an empty one if needed.
    pub fn arg_state_mut(&mut self, arg: &str) -> &mut HookArgumentState {
        self.arg_states.entry(arg.to_string()).or_default()
    }

    /// Returns the lookup reference of `arg`, if any.
    pub fn lookup_reference(&self, arg: &str) -> Option<ContentHash> {
        self.arg_states.get(arg).and_then(|s| s.lookup_reference)
    }

    /// Records that `hash` was delivered for `arg`.
    pub fn record_triggered(&mut self, arg: &str, hash: ContentHash) {
        let state = self.arg_state_mut(arg);
        state.lookup_reference = Some(hash);
        state.last_result_hash = Some(hash);
        state.all_result_hashes.insert(hash);
    }
}

/// Loads and saves [`HookState`]s below a cache directory.
#[derive(Debug, Clone)]
pub struct HookStateStore {
    objects: ObjectStore,
}

impl HookStateStore {
    /// Creates a hook-state store below the given cache directory.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            objects: ObjectStore::new(cache_dir),
        }
    }

    /// Returns the state path of a hook relative to the cache directory.
    pub fn state_path(hook_name: &str) -> PathBuf {
        Path::new(HOOK_STATES_DIR).join(state_file_name(hook_name))
    }

    /// Loads a hook's state, or a fresh default if none is stored.
    pub fn load(&self, hook_name: &str) -> HookState {
        self.objects
            .load_object(&Self::state_path(hook_name))
            .unwrap_or_default()
    }

    /// Persists a hook's state.
    pub fn save(&self, hook_name: &str, state: &HookState) -> Result<(), CacheError> {
        self.objects.save_object(&Self::state_path(hook_name), state)
    }
}

/// Renders a qualified hook name as a single file name.
///
/// Path separators become `.`; over-long names keep their trailing
/// `MAX_FILE_NAME_LEN` bytes, where the distinguishing part usually is.
fn state_file_name(hook_name: &str) -> String {
    let name = hook_name.replace("::", ".").replace(['/', '\\'], ".");
    if name.len() <= MAX_FILE_NAME_LEN {
        return name;
    }
    let mut start = name.len() - MAX_FILE_NAME_LEN;
    while !name.is_char_boundary(start) {
        start += 1;
    }
    name[start..].to_string()
}
