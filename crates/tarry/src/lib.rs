//! Incremental computation with content-addressed stage caching.
//!
//! A program is a graph of [`Stage`]s wired together through parameter
//! defaults: a [`ResultDependency`] feeds another stage's result in, a
//! [`FunctionDependency`] passes a callable through. Calling a stage
//! aggregates its arguments, resolves its data dependencies recursively and
//! hashes its normalized code together with every argument. A result stored
//! under that stage hash is reused; otherwise the function runs and its
//! result is persisted with full argument provenance.
//!
//! [`Hook`]s subscribe to stages through [`SubscriptionDependency`] defaults
//! and fire when a subscribed result satisfies its [`TriggerCondition`].
//!
//! ```no_run
//! use tarry::{function, Args, CallArgs, Stage, TarryResult, Value};
//!
//! let double = Stage::new(
//!     function!(
//!         fn double(args: &CallArgs) -> TarryResult<Value> {
//!             Ok(Value::Int(args.int("x")? * 2))
//!         }
//!     )
//!     .param("x"),
//! )?;
//! assert_eq!(double.call(Args::new().kwarg("x", 1))?, Value::Int(2));
//! # Ok::<(), tarry::TarryError>(())
//! ```

#![warn(missing_docs)]

pub mod aggregate;
pub mod args;
pub mod condition;
pub mod dependency;
pub mod error;
mod execution;
pub mod function;
pub mod hashing;
pub mod hook;
pub mod invocation;
pub mod stage;

pub use aggregate::{aggregate, AggregatedArgs};
pub use args::{ArgValue, Args};
pub use condition::TriggerCondition;
pub use dependency::{FunctionDependency, ResultDependency, SubscriptionDependency};
pub use error::{BoxError, TarryError, TarryResult};
pub use function::{Function, Param, ParamDefault};
pub use hashing::{hash_code, hash_combined, hash_value, normalize_source};
pub use hook::Hook;
pub use invocation::{Argument, CallArgs, Invocation};
pub use stage::Stage;

pub use tarry_common::{ContentHash, Value};
pub use tarry_config::{
    cache_dir, install, load_config, load_config_from_str, reset_cache_dir, set_cache_dir,
    ConfigError, TarryConfig,
};
