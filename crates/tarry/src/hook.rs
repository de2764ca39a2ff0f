//! Reactive hooks triggered by stage results.
//!
//! A hook wraps a function whose parameters are all subscriptions or function
//! dependencies. Each subscribed stage notifies the hook with every result it
//! produces or loads; the hook keeps durable per-argument trigger history
//! under `hook_states/` and fires when the argument's [`TriggerCondition`]
//! holds and every required subscription has data.
//!
//! [`TriggerCondition`]: crate::TriggerCondition

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tarry_cache::{HookState, HookStateStore};
use tarry_common::ContentHash;

use crate::error::{TarryError, TarryResult};
use crate::function::{Function, ParamDefault};
use crate::hashing::{hash_code, hash_combined};
use crate::invocation::{Argument, CallArgs, Invocation};

struct HookInner {
    function: RwLock<Function>,
    cache_dir: Option<PathBuf>,
    /// Serializes state read-modify-write; reentrant so a hook body may call
    /// stages it subscribes to.
    notify_lock: ReentrantMutex<()>,
    /// (stage id, argument) pairs with a registered callback.
    registered: Mutex<Vec<(usize, String)>>,
}

/// A reactive function subscribed to one or more stages.
///
/// Subscribed stages hold only a weak reference, so dropping every handle to
/// a hook stops it from firing.
#[derive(Clone)]
pub struct Hook {
    inner: Arc<HookInner>,
}

impl Hook {
    /// Creates a hook keeping its state under the process default cache
    /// directory.
    pub fn new(function: Function) -> TarryResult<Self> {
        Self::build(function, None)
    }

    /// Creates a hook keeping its state under `cache_dir`.
    pub fn with_cache_dir(function: Function, cache_dir: impl Into<PathBuf>) -> TarryResult<Self> {
        Self::build(function, Some(cache_dir.into()))
    }

    fn build(function: Function, cache_dir: Option<PathBuf>) -> TarryResult<Self> {
        validate(&function)?;
        let hook = Self {
            inner: Arc::new(HookInner {
                function: RwLock::new(function.clone()),
                cache_dir,
                notify_lock: ReentrantMutex::new(()),
                registered: Mutex::new(Vec::new()),
            }),
        };
        hook.register(&function);
        Ok(hook)
    }

    fn register(&self, function: &Function) {
        let mut registered = self.inner.registered.lock();
        for (arg, subscription) in function.subscriptions() {
            let stage = subscription.stage();
            let key = (stage.id(), arg.to_string());
            if registered.contains(&key) {
                continue;
            }
            registered.push(key);

            let weak = Arc::downgrade(&self.inner);
            let stage_id = stage.id();
            let arg = arg.to_string();
            stage.register_hook(move |hash, invocation| match weak.upgrade() {
                Some(inner) => Hook { inner }.notify(stage_id, &arg, hash, invocation),
                None => Ok(()),
            });
        }
    }

    /// Returns the current function.
    pub fn function(&self) -> Function {
        self.inner.function.read().clone()
    }

    /// Returns the qualified name of the current function.
    pub fn name(&self) -> String {
        self.inner.function.read().name().to_string()
    }

    /// Returns the directory hook state is stored under.
    pub fn cache_dir(&self) -> PathBuf {
        self.inner
            .cache_dir
            .clone()
            .unwrap_or_else(tarry_config::cache_dir)
    }

    /// Swaps the hook function.
    ///
    /// A different aggregate code hash resets the trigger history on the
    /// next notification.
    pub fn replace_function(&self, function: Function) -> TarryResult<()> {
        validate(&function)?;
        *self.inner.function.write() = function.clone();
        self.register(&function);
        Ok(())
    }

    /// Hash of the hook's own code combined with the recursive hashes of its
    /// function dependencies.
    pub fn code_hash(&self) -> TarryResult<ContentHash> {
        aggregate_code_hash(&self.function())
    }

    /// Loads the hook's persisted trigger state.
    pub fn state(&self) -> HookState {
        HookStateStore::new(&self.cache_dir()).load(&self.name())
    }

    fn notify(
        &self,
        stage_id: usize,
        arg: &str,
        hash: &ContentHash,
        invocation: &Invocation,
    ) -> TarryResult<()> {
        let _serial = self.inner.notify_lock.lock();
        let function = self.function();
        let subscription = function
            .subscriptions()
            .find(|(name, s)| *name == arg && s.stage().id() == stage_id)
            .map(|(_, s)| s.clone());
        let Some(subscription) = subscription else {
            return Ok(());
        };

        let store = HookStateStore::new(&self.cache_dir());
        let name = function.name();
        let mut state = store.load(name);
        if state.update_code_hash(aggregate_code_hash(&function)?) {
            tracing::debug!(hook = name, "hook code changed, trigger history reset");
        }
        let fired = subscription.condition().is_triggered(&state, arg, hash);
        state.record_triggered(arg, *hash);
        store.save(name, &state)?;
        if !fired {
            tracing::debug!(
                hook = name,
                arg,
                condition = %subscription.condition(),
                "not triggered"
            );
            return Ok(());
        }

        let mut call = BTreeMap::new();
        call.insert(arg.to_string(), subscription.present(invocation.clone()));
        for (other, other_subscription) in function.subscriptions() {
            if other == arg {
                continue;
            }
            let loaded = match state.lookup_reference(other) {
                Some(reference) => other_subscription.load(&reference)?,
                None => None,
            };
            let argument = match loaded {
                Some(invocation) => other_subscription.present(invocation),
                None if other_subscription.is_optional() => Argument::Absent,
                None => {
                    tracing::debug!(
                        hook = name,
                        missing = other,
                        "required subscription has no result yet"
                    );
                    return Ok(());
                }
            };
            call.insert(other.to_string(), argument);
        }
        for (dependency_name, dependency) in function.function_dependencies() {
            let argument = Argument::Function(dependency.clone());
            call.insert(dependency_name.to_string(), argument);
        }

        tracing::info!(hook = name, "Running hook");
        function.invoke(&CallArgs::from(call))?;
        Ok(())
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("function", &self.name())
            .field("cache_dir", &self.inner.cache_dir)
            .finish_non_exhaustive()
    }
}

fn aggregate_code_hash(function: &Function) -> TarryResult<ContentHash> {
    let mut dependency_hashes = BTreeMap::new();
    for (name, dependency) in function.function_dependencies() {
        dependency_hashes.insert(name.to_string(), dependency.recursive_hash()?);
    }
    hash_combined(&hash_code(function)?, &dependency_hashes)
}

/// Every hook parameter must default to a subscription or a function
/// dependency.
fn validate(function: &Function) -> TarryResult<()> {
    for param in function.params() {
        match param.default() {
            Some(ParamDefault::Subscription(_) | ParamDefault::Function(_)) => {}
            _ => {
                return Err(TarryError::InvalidParameter {
                    function: function.name().to_string(),
                    param: param.name().to_string(),
                    reason: "hook parameters must be subscriptions or function dependencies"
                        .to_string(),
                });
            }
        }
    }
    Ok(())
}
