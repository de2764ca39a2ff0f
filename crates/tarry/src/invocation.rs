//! Executed calls and the arguments a function body receives.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use tarry_common::Value;

use crate::dependency::FunctionDependency;
use crate::error::{TarryError, TarryResult};

/// One execution of a stage: its result, the arguments used and timing.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The value the function returned.
    pub result: Value,
    /// The arguments the function was (or, for a cached result, would have
    /// been) called with.
    pub args: CallArgs,
    /// Wall-clock time the execution started.
    pub start_time: SystemTime,
    /// How long the function ran.
    pub duration: Duration,
}

/// What a function body receives for one parameter.
#[derive(Debug, Clone)]
pub enum Argument {
    /// A plain value, or a dependency's result without metadata.
    Value(Value),
    /// A dependency's result with metadata.
    Invocation(Box<Invocation>),
    /// A callable passed through.
    Function(FunctionDependency),
    /// An optional subscription without data.
    Absent,
}

impl Argument {
    /// Returns a short name for the argument kind.
    pub fn kind(&self) -> String {
        match self {
            Argument::Value(v) => v.type_name().to_string(),
            Argument::Invocation(_) => "invocation".to_string(),
            Argument::Function(_) => "function".to_string(),
            Argument::Absent => "absent".to_string(),
        }
    }

    /// Returns the plain value, or the result of an invocation.
    pub fn result_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            Argument::Invocation(inv) => Some(&inv.result),
            _ => None,
        }
    }
}

/// Named arguments passed to a function body, with typed accessors.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    args: BTreeMap<String, Argument>,
}

impl CallArgs {
    /// Returns the raw argument for a parameter.
    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }

    /// Iterates over all arguments in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    fn require(&self, name: &str, expected: &'static str) -> TarryResult<&Argument> {
        self.args
            .get(name)
            .ok_or_else(|| mismatch(name, expected, "no argument"))
    }

    /// Returns a plain value argument.
    pub fn value(&self, name: &str) -> TarryResult<&Value> {
        match self.require(name, "value")? {
            Argument::Value(v) => Ok(v),
            other => Err(mismatch(name, "value", other.kind())),
        }
    }

    /// Returns an integer argument.
    pub fn int(&self, name: &str) -> TarryResult<i64> {
        let v = self.value(name)?;
        v.as_int()
            .ok_or_else(|| mismatch(name, "int", v.type_name()))
    }

    /// Returns a float argument; integers are widened.
    pub fn float(&self, name: &str) -> TarryResult<f64> {
        let v = self.value(name)?;
        v.as_float()
            .ok_or_else(|| mismatch(name, "float", v.type_name()))
    }

    /// Returns a boolean argument.
    pub fn boolean(&self, name: &str) -> TarryResult<bool> {
        let v = self.value(name)?;
        v.as_bool()
            .ok_or_else(|| mismatch(name, "bool", v.type_name()))
    }

    /// Returns a string argument.
    pub fn str(&self, name: &str) -> TarryResult<&str> {
        let v = self.value(name)?;
        v.as_str()
            .ok_or_else(|| mismatch(name, "str", v.type_name()))
    }

    /// Returns a list argument.
    pub fn list(&self, name: &str) -> TarryResult<&[Value]> {
        let v = self.value(name)?;
        v.as_list()
            .ok_or_else(|| mismatch(name, "list", v.type_name()))
    }

    /// Returns an argument passed with metadata.
    pub fn invocation(&self, name: &str) -> TarryResult<&Invocation> {
        match self.require(name, "invocation")? {
            Argument::Invocation(inv) => Ok(inv),
            other => Err(mismatch(name, "invocation", other.kind())),
        }
    }

    /// Returns a function dependency argument.
    pub fn function(&self, name: &str) -> TarryResult<&FunctionDependency> {
        match self.require(name, "function")? {
            Argument::Function(f) => Ok(f),
            other => Err(mismatch(name, "function", other.kind())),
        }
    }

    /// Returns an optional value argument; `None` when absent.
    pub fn optional(&self, name: &str) -> TarryResult<Option<&Value>> {
        match self.require(name, "optional value")? {
            Argument::Absent => Ok(None),
            Argument::Value(v) => Ok(Some(v)),
            other => Err(mismatch(name, "optional value", other.kind())),
        }
    }
}

fn mismatch(name: &str, expected: &'static str, found: impl Into<String>) -> TarryError {
    TarryError::ArgumentType {
        param: name.to_string(),
        expected,
        found: found.into(),
    }
}

impl From<BTreeMap<String, Argument>> for CallArgs {
    fn from(args: BTreeMap<String, Argument>) -> Self {
        Self { args }
    }
}

impl FromIterator<(String, Argument)> for CallArgs {
    fn from_iter<I: IntoIterator<Item = (String, Argument)>>(iter: I) -> Self {
        Self {
            args: iter.into_iter().collect(),
        }
    }
}
