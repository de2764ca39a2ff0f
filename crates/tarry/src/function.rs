//! Functions with an explicit parameter schema.
//!
//! A [`Function`] bundles everything the engine needs to know about a
//! callable: a qualified name for logs and hook state, the source text used
//! for code hashing, the ordered parameters with their declared defaults, and
//! the body itself.

use std::fmt;
use std::sync::Arc;

use tarry_common::Value;

use crate::dependency::{FunctionDependency, ResultDependency, SubscriptionDependency};
use crate::error::TarryResult;
use crate::invocation::CallArgs;

type Body = dyn Fn(&CallArgs) -> TarryResult<Value> + Send + Sync;

/// Declared default of a parameter.
#[derive(Debug, Clone)]
pub enum ParamDefault {
    /// A literal default value.
    Value(Value),
    /// The result of another stage.
    Result(ResultDependency),
    /// A callable passed through uninvoked.
    Function(FunctionDependency),
    /// A hook subscription to a stage.
    Subscription(SubscriptionDependency),
}

/// One parameter of a [`Function`].
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    default: Option<ParamDefault>,
}

impl Param {
    /// Returns the parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared default, if any.
    pub fn default(&self) -> Option<&ParamDefault> {
        self.default.as_ref()
    }
}

#[derive(Clone)]
struct FunctionInner {
    name: String,
    source: String,
    params: Vec<Param>,
    body: Arc<Body>,
}

/// A cheaply clonable handle to a function and its parameter schema.
///
/// Usually built with the [`function!`](crate::function!) macro, which keeps
/// the item's own tokens as its source:
///
/// ```
/// use tarry::{function, CallArgs, TarryResult, Value};
///
/// let double = function!(
///     fn double(args: &CallArgs) -> TarryResult<Value> {
///         Ok(Value::Int(args.int("x")? * 2))
///     }
/// )
/// .param("x");
/// assert_eq!(double.short_name(), "double");
/// ```
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

impl Function {
    /// Creates a function without parameters.
    pub fn new<F>(name: impl Into<String>, source: impl Into<String>, body: F) -> Self
    where
        F: Fn(&CallArgs) -> TarryResult<Value> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FunctionInner {
                name: name.into(),
                source: source.into(),
                params: Vec::new(),
                body: Arc::new(body),
            }),
        }
    }

    fn push_param(mut self, name: impl Into<String>, default: Option<ParamDefault>) -> Self {
        let param = Param {
            name: name.into(),
            default,
        };
        Arc::make_mut(&mut self.inner).params.push(param);
        self
    }

    /// Appends a required parameter.
    pub fn param(self, name: impl Into<String>) -> Self {
        self.push_param(name, None)
    }

    /// Appends a parameter with a literal default.
    pub fn default(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_param(name, Some(ParamDefault::Value(value.into())))
    }

    /// Appends a parameter bound to another stage's result.
    pub fn result(self, name: impl Into<String>, dependency: ResultDependency) -> Self {
        self.push_param(name, Some(ParamDefault::Result(dependency)))
    }

    /// Appends a parameter passing a callable through.
    pub fn uses(self, name: impl Into<String>, dependency: FunctionDependency) -> Self {
        self.push_param(name, Some(ParamDefault::Function(dependency)))
    }

    /// Appends a hook parameter subscribed to a stage.
    pub fn subscribe(self, name: impl Into<String>, subscription: SubscriptionDependency) -> Self {
        self.push_param(name, Some(ParamDefault::Subscription(subscription)))
    }

    /// Returns a function with the same name, source and parameters but a
    /// different body.
    pub fn with_body<F>(&self, body: F) -> Function
    where
        F: Fn(&CallArgs) -> TarryResult<Value> + Send + Sync + 'static,
    {
        Function {
            inner: Arc::new(FunctionInner {
                body: Arc::new(body),
                ..(*self.inner).clone()
            }),
        }
    }

    /// Returns the qualified name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the last `::` segment of the qualified name.
    pub fn short_name(&self) -> &str {
        self.inner
            .name
            .rsplit("::")
            .next()
            .unwrap_or(&self.inner.name)
    }

    /// Returns the source text used for code hashing.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Returns the parameters in declaration order.
    pub fn params(&self) -> &[Param] {
        &self.inner.params
    }

    /// Looks up a parameter by name.
    pub fn param_named(&self, name: &str) -> Option<&Param> {
        self.inner.params.iter().find(|p| p.name == name)
    }

    /// Returns the parameters declared as result dependencies.
    pub fn data_dependencies(&self) -> impl Iterator<Item = (&str, &ResultDependency)> {
        self.inner.params.iter().filter_map(|p| match &p.default {
            Some(ParamDefault::Result(d)) => Some((p.name.as_str(), d)),
            _ => None,
        })
    }

    /// Returns the parameters declared as function dependencies.
    pub fn function_dependencies(&self) -> impl Iterator<Item = (&str, &FunctionDependency)> {
        self.inner.params.iter().filter_map(|p| match &p.default {
            Some(ParamDefault::Function(d)) => Some((p.name.as_str(), d)),
            _ => None,
        })
    }

    /// Returns the parameters declared as subscriptions.
    pub fn subscriptions(&self) -> impl Iterator<Item = (&str, &SubscriptionDependency)> {
        self.inner.params.iter().filter_map(|p| match &p.default {
            Some(ParamDefault::Subscription(s)) => Some((p.name.as_str(), s)),
            _ => None,
        })
    }

    /// Runs the body.
    pub fn invoke(&self, args: &CallArgs) -> TarryResult<Value> {
        (self.inner.body)(args)
    }

    /// Returns an identity shared by all clones of this handle.
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.inner.name)
            .field("params", &self.inner.params)
            .finish_non_exhaustive()
    }
}

/// Defines a function item and wraps it in a [`Function`].
///
/// The item must have the signature
/// `fn name(args: &CallArgs) -> TarryResult<Value>`. Its tokens become the
/// hashed source and its name is qualified with the calling module's path.
/// Parameters are declared afterwards with the builder methods.
#[macro_export]
macro_rules! function {
    ($(#[$attr:meta])* fn $name:ident $($rest:tt)*) => {{
        $(#[$attr])*
        fn $name $($rest)*
        $crate::Function::new(
            concat!(module_path!(), "::", stringify!($name)),
            stringify!($(#[$attr])* fn $name $($rest)*),
            $name,
        )
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TarryError;

    fn answer() -> Function {
        crate::function!(
            fn answer(args: &CallArgs) -> TarryResult<Value> {
                Ok(Value::Int(args.int("base")? + 2))
            }
        )
        .default("base", 40)
    }

    #[test]
    fn macro_captures_name_and_source() {
        let f = answer();
        assert!(f.name().ends_with("::answer"));
        assert_eq!(f.short_name(), "answer");
        assert!(f.source().starts_with("fn answer"));
        assert!(f.source().contains("base"));
    }

    #[test]
    fn params_keep_declaration_order() {
        let f = Function::new("demo::f", "fn f() {}", |_| Ok(Value::Unit))
            .param("a")
            .default("b", 1)
            .param("c");
        let names: Vec<_> = f.params().iter().map(Param::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(f.param_named("a").unwrap().default().is_none());
        assert!(matches!(
            f.param_named("b").unwrap().default(),
            Some(ParamDefault::Value(Value::Int(1)))
        ));
    }

    #[test]
    fn invoke_runs_body() {
        let f = answer();
        let mut args = std::collections::BTreeMap::new();
        args.insert("base".to_string(), crate::Argument::Value(Value::Int(1)));
        assert_eq!(f.invoke(&CallArgs::from(args)).unwrap(), Value::Int(3));
    }

    #[test]
    fn with_body_keeps_schema_and_source() {
        let f = answer();
        let g = f.with_body(|_| Err(TarryError::function("replaced")));
        assert_eq!(g.name(), f.name());
        assert_eq!(g.source(), f.source());
        assert_eq!(g.params().len(), 1);
        assert_ne!(g.id(), f.id());
        assert!(g.invoke(&CallArgs::default()).is_err());
    }

    #[test]
    fn clones_share_identity() {
        let f = answer();
        assert_eq!(f.clone().id(), f.id());
    }
}
