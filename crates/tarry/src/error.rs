//! Error types for stage and hook execution.

use tarry_cache::CacheError;
use tarry_common::{CodecError, ContentHash};

/// Boxed error raised by a user function body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while declaring, resolving, executing or loading stages
/// and hooks.
///
/// Cache misses are never errors; only declaration mistakes, hashing
/// failures, failed writes and failing user functions surface here.
#[derive(Debug, thiserror::Error)]
pub enum TarryError {
    /// A dependency was passed as a call value instead of a declared default.
    #[error(
        "dependency passed as value for parameter '{param}' of '{function}'; \
         dependencies are only allowed as declared defaults"
    )]
    DependencyAsValue {
        /// The called function.
        function: String,
        /// The parameter the dependency was passed to.
        param: String,
    },

    /// An `Args` override was passed to a parameter whose default is not a
    /// result dependency.
    #[error(
        "Args override passed to parameter '{param}' of '{function}', \
         which is not declared as a result dependency"
    )]
    OverrideNotAllowed {
        /// The called function.
        function: String,
        /// The parameter the override was passed to.
        param: String,
    },

    /// A parameter without default was not supplied.
    #[error("missing argument '{param}' for '{function}'")]
    MissingArgument {
        /// The called function.
        function: String,
        /// The unsupplied parameter.
        param: String,
    },

    /// An argument matched no parameter.
    #[error("unexpected argument {arg} for '{function}'")]
    UnexpectedArgument {
        /// The called function.
        function: String,
        /// The extra argument: a name or a positional index.
        arg: String,
    },

    /// A parameter was supplied both positionally and by name.
    #[error("parameter '{param}' of '{function}' supplied both positionally and by name")]
    DuplicateArgument {
        /// The called function.
        function: String,
        /// The doubly supplied parameter.
        param: String,
    },

    /// A parameter declaration is not allowed where it appears.
    #[error("invalid parameter '{param}' of '{function}': {reason}")]
    InvalidParameter {
        /// The declaring function.
        function: String,
        /// The offending parameter.
        param: String,
        /// Why the declaration is rejected.
        reason: String,
    },

    /// A function dependency reaches a data dependency somewhere in its graph.
    #[error(
        "function dependency '{param}' of '{function}' has (recursive) data dependencies, \
         which prevents caching of the stage"
    )]
    DataDependencyInFunction {
        /// The stage function declaring the dependency.
        function: String,
        /// The function-dependency parameter.
        param: String,
    },

    /// Function source could not be normalized for hashing.
    #[error("cannot hash code of '{function}': {reason}")]
    CodeHash {
        /// The function whose source was hashed.
        function: String,
        /// Why the source was rejected.
        reason: String,
    },

    /// A value could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A cache write failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// No result is stored under the requested stage hash.
    #[error("no stored result for stage hash {hash}")]
    NotFound {
        /// The requested stage hash.
        hash: ContentHash,
    },

    /// A stored argument's provenance no longer matches the parameter's
    /// current default.
    #[error(
        "argument '{param}' of '{function}' was stored as {stored}, \
         but its current default is {current}"
    )]
    DependencyKindChanged {
        /// The stage function.
        function: String,
        /// The parameter.
        param: String,
        /// The provenance kind found in the stored record.
        stored: &'static str,
        /// The kind of the parameter's current default.
        current: &'static str,
    },

    /// A trigger predicate identifier is not known.
    #[error("unknown trigger condition '{name}'")]
    UnknownCondition {
        /// The unrecognized identifier.
        name: String,
    },

    /// A stage or function dependency reaches itself.
    #[error("cyclic dependency: {chain}")]
    CyclicDependency {
        /// The chain of names forming the cycle.
        chain: String,
    },

    /// A function body asked for an argument of the wrong kind.
    #[error("argument '{param}' expected {expected}, found {found}")]
    ArgumentType {
        /// The parameter.
        param: String,
        /// The kind the body asked for.
        expected: &'static str,
        /// The kind actually passed.
        found: String,
    },

    /// Another caller executing the same stage hash failed.
    #[error("concurrent execution of stage {hash} failed: {reason}")]
    ConcurrentExecution {
        /// The stage hash being executed.
        hash: ContentHash,
        /// The leader's error message.
        reason: String,
    },

    /// A user function body failed.
    #[error(transparent)]
    Function(BoxError),
}

impl TarryError {
    /// Wraps an error raised by a user function body.
    pub fn function(err: impl Into<BoxError>) -> Self {
        TarryError::Function(err.into())
    }
}

/// Convenience alias used throughout the engine.
pub type TarryResult<T> = Result<T, TarryError>;
