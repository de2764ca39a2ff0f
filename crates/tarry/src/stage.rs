//! Memoizable stages.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tarry_common::{ContentHash, Value};

use crate::args::Args;
use crate::error::{TarryError, TarryResult};
use crate::execution;
use crate::function::{Function, ParamDefault};
use crate::invocation::{Argument, Invocation};

type HookCallback = Arc<dyn Fn(&ContentHash, &Invocation) -> TarryResult<()> + Send + Sync>;

struct StageInner {
    function: RwLock<Function>,
    cache_dir: Option<PathBuf>,
    hooks: RwLock<Vec<HookCallback>>,
}

/// A memoizable unit of computation wrapping a [`Function`].
///
/// A stage is a cheap handle with a stable identity; the wrapped function can
/// be swapped with [`replace_function`](Self::replace_function). The stage
/// keeps no results itself: history lives in the result store under the
/// cache directory, keyed by stage hash, so an identical replacement
/// function reuses it.
#[derive(Clone)]
pub struct Stage {
    inner: Arc<StageInner>,
}

impl Stage {
    /// Wraps a function, storing results under the process default cache
    /// directory.
    pub fn new(function: Function) -> TarryResult<Self> {
        Self::build(function, None)
    }

    /// Wraps a function, storing results under `cache_dir`.
    pub fn with_cache_dir(function: Function, cache_dir: impl Into<PathBuf>) -> TarryResult<Self> {
        Self::build(function, Some(cache_dir.into()))
    }

    fn build(function: Function, cache_dir: Option<PathBuf>) -> TarryResult<Self> {
        validate(&function)?;
        Ok(Self {
            inner: Arc::new(StageInner {
                function: RwLock::new(function),
                cache_dir,
                hooks: RwLock::new(Vec::new()),
            }),
        })
    }

    /// Returns the current function.
    pub fn function(&self) -> Function {
        self.inner.function.read().clone()
    }

    /// Returns the qualified name of the current function.
    pub fn name(&self) -> String {
        self.inner.function.read().name().to_string()
    }

    /// Returns the directory results are stored under.
    pub fn cache_dir(&self) -> PathBuf {
        self.inner
            .cache_dir
            .clone()
            .unwrap_or_else(tarry_config::cache_dir)
    }

    /// Swaps the wrapped function, keeping the stage's identity and hooks.
    pub fn replace_function(&self, function: Function) -> TarryResult<()> {
        validate(&function)?;
        *self.inner.function.write() = function;
        Ok(())
    }

    /// Computes or loads the result for `args` and returns its value.
    pub fn call(&self, args: Args) -> TarryResult<Value> {
        let (_, invocation) = self.compute_or_load(&args)?;
        Ok(invocation.result)
    }

    /// Computes or loads the result for `args`.
    ///
    /// Data dependencies are resolved first, recursively. Registered hooks
    /// are notified whether the result was computed or loaded.
    pub fn compute_or_load(&self, args: &Args) -> TarryResult<(ContentHash, Invocation)> {
        let (hash, invocation) = execution::compute_or_load(self, args)?;
        self.run_hooks(&hash, &invocation)?;
        Ok((hash, invocation))
    }

    /// Registers a callback notified with every result of this stage.
    pub fn register_hook<F>(&self, callback: F)
    where
        F: Fn(&ContentHash, &Invocation) -> TarryResult<()> + Send + Sync + 'static,
    {
        self.inner.hooks.write().push(Arc::new(callback));
    }

    fn run_hooks(&self, hash: &ContentHash, invocation: &Invocation) -> TarryResult<()> {
        let callbacks = self.inner.hooks.read().clone();
        for callback in callbacks {
            callback(hash, invocation)?;
        }
        Ok(())
    }

    /// Loads a stored result, with or without metadata.
    pub fn load_result(&self, hash: &ContentHash, with_metadata: bool) -> TarryResult<Argument> {
        if with_metadata {
            self.load_invocation(hash)
                .map(|invocation| Argument::Invocation(Box::new(invocation)))
        } else {
            self.load_value(hash).map(Argument::Value)
        }
    }

    /// Loads only the value of a stored result.
    pub fn load_value(&self, hash: &ContentHash) -> TarryResult<Value> {
        let record = execution::load_record(&self.cache_dir(), hash)?;
        Ok(record.result)
    }

    /// Loads a stored result with its arguments.
    ///
    /// Reference arguments are loaded one level deep through the producer
    /// stage bound to the parameter now. Function arguments are the
    /// currently bound dependency.
    pub fn load_invocation(&self, hash: &ContentHash) -> TarryResult<Invocation> {
        execution::load_invocation(&self.function(), &self.cache_dir(), hash)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("function", &self.name())
            .field("cache_dir", &self.inner.cache_dir)
            .finish_non_exhaustive()
    }
}

/// Rejects parameters a stage cannot have.
fn validate(function: &Function) -> TarryResult<()> {
    for param in function.params() {
        if let Some(ParamDefault::Subscription(_)) = param.default() {
            return Err(TarryError::InvalidParameter {
                function: function.name().to_string(),
                param: param.name().to_string(),
                reason: "subscriptions are only allowed on hook parameters".to_string(),
            });
        }
    }
    Ok(())
}
