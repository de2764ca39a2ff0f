//! Stage resolution, hashing and load-or-execute.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Instant, SystemTime};

use tarry_cache::{InFlightRegistry, JoinError, PersistedArg, PersistedInvocation, ResultStore};
use tarry_common::{ContentHash, Value};

use crate::aggregate::{aggregate, AggregatedArgs};
use crate::args::Args;
use crate::dependency::{check_cachable, default_kind};
use crate::error::{TarryError, TarryResult};
use crate::function::{Function, ParamDefault};
use crate::hashing::{hash_code, hash_combined, hash_value};
use crate::invocation::{Argument, CallArgs, Invocation};
use crate::stage::Stage;

/// Executions currently running in this process, keyed by record location.
static IN_FLIGHT: LazyLock<InFlightRegistry<PathBuf, PersistedInvocation>> =
    LazyLock::new(InFlightRegistry::new);

thread_local! {
    /// Stages being resolved on this thread: (stage id, args fingerprint, name).
    static RESOLVING: RefCell<Vec<(usize, String, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a stage call as being resolved on this thread until dropped.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(stage: &Stage, args: &Args) -> TarryResult<Self> {
        let id = stage.id();
        let fingerprint = args.fingerprint();
        let name = stage.name();
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(i, f, _)| *i == id && *f == fingerprint) {
                let chain = stack
                    .iter()
                    .map(|(_, _, n)| n.as_str())
                    .chain(std::iter::once(name.as_str()))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(TarryError::CyclicDependency { chain });
            }
            stack.push((id, fingerprint, name));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Everything needed to hash, run and persist one call.
struct Prepared {
    call_args: BTreeMap<String, Argument>,
    arg_hashes: BTreeMap<String, ContentHash>,
    persisted: BTreeMap<String, PersistedArg>,
}

/// Resolves data dependencies and hashes every argument.
fn prepare(aggregated: AggregatedArgs) -> TarryResult<Prepared> {
    let mut prepared = Prepared {
        call_args: BTreeMap::new(),
        arg_hashes: BTreeMap::new(),
        persisted: BTreeMap::new(),
    };

    for (name, value) in aggregated.values {
        let value_hash = hash_value(&value)?;
        prepared.arg_hashes.insert(name.clone(), value_hash);
        prepared
            .persisted
            .insert(name.clone(), PersistedArg::Literal(value.clone()));
        prepared.call_args.insert(name, Argument::Value(value));
    }

    for (name, (dependency, overrides)) in aggregated.data_dependencies {
        let (reference, invocation) = dependency.resolve(overrides.as_ref())?;
        prepared
            .arg_hashes
            .insert(name.clone(), hash_value(&invocation.result)?);
        prepared
            .persisted
            .insert(name.clone(), PersistedArg::Reference(reference));
        let argument = if dependency.wants_metadata() {
            Argument::Invocation(Box::new(invocation))
        } else {
            Argument::Value(invocation.result)
        };
        prepared.call_args.insert(name, argument);
    }

    for (name, dependency) in aggregated.function_dependencies {
        let code_hash = dependency.recursive_hash()?;
        prepared.arg_hashes.insert(name.clone(), code_hash);
        prepared
            .persisted
            .insert(name.clone(), PersistedArg::Function(code_hash));
        let argument = Argument::Function(dependency);
        prepared.call_args.insert(name, argument);
    }

    Ok(prepared)
}

/// Resolves, hashes and loads or executes one stage call.
pub(crate) fn compute_or_load(
    stage: &Stage,
    args: &Args,
) -> TarryResult<(ContentHash, Invocation)> {
    let _guard = ResolutionGuard::enter(stage, args)?;
    let function = stage.function();
    check_cachable(&function)?;
    let prepared = prepare(aggregate(&function, args)?)?;
    let store = ResultStore::new(&stage.cache_dir());
    exec_or_load(&function, prepared, &store)
}

fn exec_or_load(
    function: &Function,
    prepared: Prepared,
    store: &ResultStore,
) -> TarryResult<(ContentHash, Invocation)> {
    let code_hash = hash_code(function)?;
    let stage_hash = hash_combined(&code_hash, &prepared.arg_hashes)?;
    let call_args = CallArgs::from(prepared.call_args);
    let persisted = prepared.persisted;

    let load_or_execute = || -> TarryResult<PersistedInvocation> {
        if let Some(record) = store.load(&stage_hash) {
            tracing::info!(stage = function.name(), hash = %stage_hash, "Using cached");
            return Ok(record);
        }

        tracing::info!(stage = function.name(), hash = %stage_hash, "Executing");
        let start_time = SystemTime::now();
        let timer = Instant::now();
        let result = function.invoke(&call_args)?;
        let record = PersistedInvocation {
            result,
            args: persisted,
            code_hash,
            start_time,
            duration: timer.elapsed(),
        };
        store.save(&stage_hash, &record)?;
        Ok(record)
    };
    let record = IN_FLIGHT
        .run(store.location(&stage_hash), load_or_execute)
        .map_err(|e| match e {
            JoinError::Own(e) => e,
            JoinError::Leader(reason) => TarryError::ConcurrentExecution {
                hash: stage_hash,
                reason,
            },
        })?;

    let invocation = Invocation {
        result: record.result,
        args: call_args,
        start_time: record.start_time,
        duration: record.duration,
    };
    Ok((stage_hash, invocation))
}

/// Calls a plain function outside any cache.
pub(crate) fn call_uncached(function: &Function, args: &Args) -> TarryResult<Value> {
    let prepared = prepare(aggregate(function, args)?)?;
    function.invoke(&CallArgs::from(prepared.call_args))
}

/// Loads the record stored under `hash`.
pub(crate) fn load_record(
    cache_dir: &Path,
    hash: &ContentHash,
) -> TarryResult<PersistedInvocation> {
    ResultStore::new(cache_dir)
        .load(hash)
        .ok_or(TarryError::NotFound { hash: *hash })
}

/// Rebuilds an invocation from its record, using the current defaults of
/// `function` to interpret reference and function arguments.
pub(crate) fn load_invocation(
    function: &Function,
    cache_dir: &Path,
    hash: &ContentHash,
) -> TarryResult<Invocation> {
    let record = load_record(cache_dir, hash)?;
    let mut args = BTreeMap::new();
    for (name, persisted) in record.args {
        let default = function.param_named(&name).and_then(|p| p.default());
        let argument = match (persisted, default) {
            (PersistedArg::Literal(value), _) => Argument::Value(value),
            (PersistedArg::Reference(reference), Some(ParamDefault::Result(dependency))) => {
                Argument::Value(dependency.stage().load_value(&reference)?)
            }
            (PersistedArg::Function(_), Some(ParamDefault::Function(dependency))) => {
                Argument::Function(dependency.clone())
            }
            (persisted, default) => {
                return Err(TarryError::DependencyKindChanged {
                    function: function.name().to_string(),
                    param: name,
                    stored: persisted.kind(),
                    current: default_kind(default),
                });
            }
        };
        args.insert(name, argument);
    }

    Ok(Invocation {
        result: record.result,
        args: CallArgs::from(args),
        start_time: record.start_time,
        duration: record.duration,
    })
}
