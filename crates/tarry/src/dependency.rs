//! Dependency declarations used as parameter defaults.
//!
//! Each kind exposes one capability: a [`ResultDependency`] resolves to a
//! producer stage's result, a [`FunctionDependency`] hashes the code of the
//! callable it passes through, and a [`SubscriptionDependency`] loads results
//! for a hook.

use std::collections::BTreeMap;
use std::fmt;

use tarry_common::{ContentHash, Value};

use crate::args::Args;
use crate::condition::TriggerCondition;
use crate::error::{TarryError, TarryResult};
use crate::execution;
use crate::function::{Function, ParamDefault};
use crate::hashing::{hash_code, hash_combined};
use crate::invocation::{Argument, Invocation};
use crate::stage::Stage;

/// A parameter whose value is another stage's result.
#[derive(Clone)]
pub struct ResultDependency {
    stage: Stage,
    args: Args,
    with_metadata: bool,
}

impl ResultDependency {
    /// Binds to a producer stage with default arguments.
    ///
    /// Fails if the producer cannot be cached because one of its function
    /// dependencies reaches a data dependency.
    pub fn new(stage: &Stage, args: Args) -> TarryResult<Self> {
        check_cachable(&stage.function())?;
        Ok(Self {
            stage: stage.clone(),
            args,
            with_metadata: false,
        })
    }

    /// Requests the full [`Invocation`] instead of the bare result.
    pub fn with_metadata(mut self) -> Self {
        self.with_metadata = true;
        self
    }

    /// Returns the producer stage.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Returns the declared default arguments.
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Returns `true` if the consumer receives metadata.
    pub fn wants_metadata(&self) -> bool {
        self.with_metadata
    }

    /// Computes or loads the producer's result, merging `overrides` into the
    /// declared default arguments.
    pub fn resolve(&self, overrides: Option<&Args>) -> TarryResult<(ContentHash, Invocation)> {
        let args = self.args.merged_with(overrides);
        self.stage.compute_or_load(&args)
    }
}

impl fmt::Debug for ResultDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultDependency")
            .field("stage", &self.stage.name())
            .field("args", &self.args)
            .field("with_metadata", &self.with_metadata)
            .finish()
    }
}

#[derive(Clone)]
enum Target {
    Plain(Function),
    Stage(Stage),
}

/// A parameter passing a callable through to the body uninvoked.
///
/// It contributes the recursive hash of its code to the consumer's stage
/// hash, so it must never reach a data dependency.
#[derive(Clone)]
pub struct FunctionDependency {
    target: Target,
}

impl FunctionDependency {
    /// Passes a plain function through.
    pub fn new(function: Function) -> Self {
        Self {
            target: Target::Plain(function),
        }
    }

    /// Passes a stage through; calling it goes through the stage's cache.
    pub fn stage(stage: &Stage) -> Self {
        Self {
            target: Target::Stage(stage.clone()),
        }
    }

    /// Returns the function currently behind this dependency.
    pub fn function(&self) -> Function {
        match &self.target {
            Target::Plain(f) => f.clone(),
            Target::Stage(s) => s.function(),
        }
    }

    /// Returns the stage behind this dependency, if it wraps one.
    pub fn target_stage(&self) -> Option<&Stage> {
        match &self.target {
            Target::Plain(_) => None,
            Target::Stage(s) => Some(s),
        }
    }

    /// Hash over this function's code and, recursively, the code of every
    /// function dependency it declares.
    pub fn recursive_hash(&self) -> TarryResult<ContentHash> {
        self.recursive_hash_in(&mut Vec::new())
    }

    fn recursive_hash_in(&self, path: &mut Vec<(usize, String)>) -> TarryResult<ContentHash> {
        let function = self.function();
        enter(path, &function)?;
        let code_hash = hash_code(&function)?;
        let mut nested = BTreeMap::new();
        for (name, dependency) in function.function_dependencies() {
            nested.insert(name.to_string(), dependency.recursive_hash_in(path)?);
        }
        path.pop();
        hash_combined(&code_hash, &nested)
    }

    /// Returns `true` if no data dependency appears anywhere in this
    /// function's dependency graph.
    pub fn has_no_data_dependencies(&self) -> TarryResult<bool> {
        self.has_no_data_dependencies_in(&mut Vec::new())
    }

    fn has_no_data_dependencies_in(&self, path: &mut Vec<(usize, String)>) -> TarryResult<bool> {
        let function = self.function();
        if function.data_dependencies().next().is_some() {
            return Ok(false);
        }
        enter(path, &function)?;
        for (_, dependency) in function.function_dependencies() {
            if !dependency.has_no_data_dependencies_in(path)? {
                return Ok(false);
            }
        }
        path.pop();
        Ok(true)
    }

    /// Calls the wrapped callable.
    ///
    /// A stage is called through its cache; a plain function has its data
    /// dependencies resolved and then runs directly.
    pub fn call(&self, args: Args) -> TarryResult<Value> {
        match &self.target {
            Target::Stage(stage) => stage.call(args),
            Target::Plain(function) => execution::call_uncached(function, &args),
        }
    }
}

impl fmt::Debug for FunctionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Plain(_) => "function",
            Target::Stage(_) => "stage",
        };
        f.debug_struct("FunctionDependency")
            .field(kind, &self.function().name())
            .finish()
    }
}

/// Pushes `function` on a traversal path, failing if it is already on it.
fn enter(path: &mut Vec<(usize, String)>, function: &Function) -> TarryResult<()> {
    if path.iter().any(|(id, _)| *id == function.id()) {
        let chain = path
            .iter()
            .map(|(_, name)| name.as_str())
            .chain(std::iter::once(function.name()))
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(TarryError::CyclicDependency { chain });
    }
    path.push((function.id(), function.name().to_string()));
    Ok(())
}

/// Rejects a stage function whose function dependencies reach a data
/// dependency.
pub(crate) fn check_cachable(function: &Function) -> TarryResult<()> {
    for (name, dependency) in function.function_dependencies() {
        if !dependency.has_no_data_dependencies()? {
            return Err(TarryError::DataDependencyInFunction {
                function: function.name().to_string(),
                param: name.to_string(),
            });
        }
    }
    Ok(())
}

/// A hook parameter subscribed to a stage's results.
#[derive(Clone)]
pub struct SubscriptionDependency {
    stage: Stage,
    when: TriggerCondition,
    optional: bool,
    with_metadata: bool,
}

impl SubscriptionDependency {
    /// Subscribes to a stage, firing on [`TriggerCondition::DifferentFromLast`].
    pub fn new(stage: &Stage) -> Self {
        Self {
            stage: stage.clone(),
            when: TriggerCondition::default(),
            optional: false,
            with_metadata: false,
        }
    }

    /// Sets the trigger predicate.
    pub fn when(mut self, condition: TriggerCondition) -> Self {
        self.when = condition;
        self
    }

    /// Lets the hook fire without data for this argument.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Requests the full [`Invocation`] instead of the bare result.
    pub fn with_metadata(mut self) -> Self {
        self.with_metadata = true;
        self
    }

    /// Returns the subscribed stage.
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Returns the trigger predicate.
    pub fn condition(&self) -> TriggerCondition {
        self.when
    }

    /// Returns `true` if the hook may fire without data for this argument.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns `true` if the hook receives metadata.
    pub fn wants_metadata(&self) -> bool {
        self.with_metadata
    }

    /// Loads a stored result of the subscribed stage, `None` if absent.
    pub fn load(&self, hash: &ContentHash) -> TarryResult<Option<Invocation>> {
        match self.stage.load_invocation(hash) {
            Ok(invocation) => Ok(Some(invocation)),
            Err(TarryError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Shapes a loaded result the way the hook asked for it.
    pub(crate) fn present(&self, invocation: Invocation) -> Argument {
        if self.with_metadata {
            Argument::Invocation(Box::new(invocation))
        } else {
            Argument::Value(invocation.result)
        }
    }
}

impl fmt::Debug for SubscriptionDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDependency")
            .field("stage", &self.stage.name())
            .field("when", &self.when)
            .field("optional", &self.optional)
            .field("with_metadata", &self.with_metadata)
            .finish()
    }
}

/// Returns the declared dependency kind of a parameter default.
pub(crate) fn default_kind(default: Option<&ParamDefault>) -> &'static str {
    match default {
        None => "none",
        Some(ParamDefault::Value(_)) => "literal",
        Some(ParamDefault::Result(_)) => "result",
        Some(ParamDefault::Function(_)) => "function",
        Some(ParamDefault::Subscription(_)) => "subscription",
    }
}
