//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tarry::{Function, Stage, Value};

#[derive(Default)]
struct Calls {
    counts: HashMap<String, usize>,
    outputs: HashMap<String, Value>,
}

/// Counts calls per function name and remembers each function's last output.
#[derive(Clone, Default)]
pub struct CallCounter {
    calls: Arc<Mutex<Calls>>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a function so every call is counted under its short name.
    ///
    /// The wrapper keeps the function's source, so code hashes are unchanged.
    pub fn counted(&self, function: Function) -> Function {
        let calls = Arc::clone(&self.calls);
        let name = function.short_name().to_string();
        let inner = function.clone();
        function.with_body(move |args| {
            *calls.lock().counts.entry(name.clone()).or_default() += 1;
            let output = inner.invoke(args)?;
            calls.lock().outputs.insert(name.clone(), output.clone());
            Ok(output)
        })
    }

    /// Wraps a counted function in a stage storing results under `dir`.
    pub fn stage(&self, function: Function, dir: &Path) -> Stage {
        Stage::with_cache_dir(self.counted(function), dir).unwrap()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().counts.get(name).copied().unwrap_or(0)
    }

    pub fn output(&self, name: &str) -> Option<Value> {
        self.calls.lock().outputs.get(name).cloned()
    }
}

/// Builds a list of strings.
pub fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}
