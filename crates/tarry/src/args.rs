//! Call arguments and argument overrides.

use std::collections::BTreeMap;

use tarry_common::Value;

use crate::dependency::{FunctionDependency, ResultDependency};

/// One caller-supplied argument.
///
/// Dependencies are representable so that passing one as a value can be
/// rejected during aggregation.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// A plain value.
    Value(Value),
    /// An override bundle for a parameter declared as a result dependency.
    Args(Args),
    /// A result dependency (illegal as a call value).
    Result(ResultDependency),
    /// A function dependency (illegal as a call value).
    Function(FunctionDependency),
}

impl ArgValue {
    /// Returns the contained value, if this is a plain value.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ArgValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the contained override bundle, if any.
    pub fn as_args(&self) -> Option<&Args> {
        match self {
            ArgValue::Args(a) => Some(a),
            _ => None,
        }
    }
}

macro_rules! arg_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(v: $ty) -> Self {
                    ArgValue::Value(Value::from(v))
                }
            }
        )*
    };
}

arg_value_from!(bool, i32, i64, u32, f64, &str, String, Vec<Value>);

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        ArgValue::Value(v)
    }
}

impl From<Args> for ArgValue {
    fn from(a: Args) -> Self {
        ArgValue::Args(a)
    }
}

impl From<ResultDependency> for ArgValue {
    fn from(d: ResultDependency) -> Self {
        ArgValue::Result(d)
    }
}

impl From<FunctionDependency> for ArgValue {
    fn from(d: FunctionDependency) -> Self {
        ArgValue::Function(d)
    }
}

/// Ordered positional values plus named values.
///
/// ```
/// use tarry::Args;
///
/// let args = Args::new().arg(true).kwarg("sauce", "Ricotta");
/// assert_eq!(args.positional().len(), 1);
/// assert!(args.named().contains_key("sauce"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<ArgValue>,
    named: BTreeMap<String, ArgValue>,
}

impl Args {
    /// Creates an empty argument bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a named argument, replacing any previous one with that name.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Returns the positional arguments in order.
    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    /// Returns the named arguments.
    pub fn named(&self) -> &BTreeMap<String, ArgValue> {
        &self.named
    }

    /// Returns `true` if no argument is set.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Merges an override bundle into these default arguments.
    ///
    /// Override positionals replace the leading defaults one-for-one; the
    /// remaining defaults are kept. Named arguments are united, the override
    /// winning on conflicts.
    pub fn merged_with(&self, overrides: Option<&Args>) -> Args {
        let Some(overrides) = overrides else {
            return self.clone();
        };
        let positional = overrides
            .positional
            .iter()
            .chain(self.positional.iter().skip(overrides.positional.len()))
            .cloned()
            .collect();
        let mut named = self.named.clone();
        named.extend(overrides.named.clone());
        Args { positional, named }
    }

    /// Returns a stable textual identity of these arguments.
    pub(crate) fn fingerprint(&self) -> String {
        format!("{self:?}")
    }
}
