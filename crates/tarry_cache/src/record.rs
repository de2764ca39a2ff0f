//! Durable records of stage executions.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tarry_common::{ContentHash, Value};

/// How one argument of a persisted invocation was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PersistedArg {
    /// A plain value supplied directly or taken from a literal default.
    Literal(Value),
    /// The stage hash of another stage's result.
    Reference(ContentHash),
    /// The recursive code hash of a function dependency.
    Function(ContentHash),
}

impl PersistedArg {
    /// Returns a short name for the provenance kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PersistedArg::Literal(_) => "literal",
            PersistedArg::Reference(_) => "reference",
            PersistedArg::Function(_) => "function",
        }
    }
}

/// The durable form of one stage execution.
///
/// Immutable once stored; the stage hash it is stored under already covers
/// `code_hash` and every argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedInvocation {
    /// The value the stage function returned.
    pub result: Value,
    /// Provenance of every argument, keyed by parameter name.
    pub args: BTreeMap<String, PersistedArg>,
    /// Code hash of the stage function that produced `result`.
    pub code_hash: ContentHash,
    /// Wall-clock time the execution started.
    pub start_time: SystemTime,
    /// How long the function ran.
    pub duration: Duration,
}
