//! Classification of call arguments against a parameter schema.

use std::collections::BTreeMap;

use tarry_common::Value;

use crate::args::{ArgValue, Args};
use crate::dependency::{FunctionDependency, ResultDependency};
use crate::error::{TarryError, TarryResult};
use crate::function::{Function, ParamDefault};

/// Arguments of one call, split by how they are obtained.
#[derive(Debug, Default)]
pub struct AggregatedArgs {
    /// Plain values, supplied or taken from literal defaults.
    pub values: BTreeMap<String, Value>,
    /// Data dependencies with any caller override of their default args.
    pub data_dependencies: BTreeMap<String, (ResultDependency, Option<Args>)>,
    /// Function dependencies passed through to the body.
    pub function_dependencies: BTreeMap<String, FunctionDependency>,
}

/// Classifies `args` against the parameters of `function`.
///
/// A parameter is set when supplied by position or by name. A set plain value
/// wins outright. An `Args` bundle is only legal for a parameter whose default
/// is a result dependency and is kept as that dependency's override. Unset
/// parameters fall back to their declared default.
pub fn aggregate(function: &Function, args: &Args) -> TarryResult<AggregatedArgs> {
    let params = function.params();
    let name = || function.name().to_string();

    if args.positional().len() > params.len() {
        return Err(TarryError::UnexpectedArgument {
            function: name(),
            arg: format!("at position {}", params.len()),
        });
    }
    let unknown = args
        .named()
        .keys()
        .find(|key| function.param_named(key).is_none());
    if let Some(unknown) = unknown {
        return Err(TarryError::UnexpectedArgument {
            function: name(),
            arg: format!("'{unknown}'"),
        });
    }

    let mut aggregated = AggregatedArgs::default();
    for (index, param) in params.iter().enumerate() {
        let param_name = param.name().to_string();
        let positional = args.positional().get(index);
        let named = args.named().get(param.name());
        if positional.is_some() && named.is_some() {
            return Err(TarryError::DuplicateArgument {
                function: name(),
                param: param_name,
            });
        }

        match (positional.or(named), param.default()) {
            (Some(ArgValue::Result(_) | ArgValue::Function(_)), _) => {
                return Err(TarryError::DependencyAsValue {
                    function: name(),
                    param: param_name,
                });
            }
            (Some(ArgValue::Args(overrides)), Some(ParamDefault::Result(dependency))) => {
                aggregated
                    .data_dependencies
                    .insert(param_name, (dependency.clone(), Some(overrides.clone())));
            }
            (Some(ArgValue::Args(_)), _) => {
                return Err(TarryError::OverrideNotAllowed {
                    function: name(),
                    param: param_name,
                });
            }
            (Some(ArgValue::Value(value)), _) | (None, Some(ParamDefault::Value(value))) => {
                aggregated.values.insert(param_name, value.clone());
            }
            (None, Some(ParamDefault::Result(dependency))) => {
                aggregated
                    .data_dependencies
                    .insert(param_name, (dependency.clone(), None));
            }
            (None, Some(ParamDefault::Function(dependency))) => {
                aggregated
                    .function_dependencies
                    .insert(param_name, dependency.clone());
            }
            (None, Some(ParamDefault::Subscription(_))) => {
                return Err(TarryError::InvalidParameter {
                    function: name(),
                    param: param_name,
                    reason: "subscriptions are only allowed on hook parameters".to_string(),
                });
            }
            (None, None) => {
                return Err(TarryError::MissingArgument {
                    function: name(),
                    param: param_name,
                });
            }
        }
    }
    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::CallArgs;
    use crate::stage::Stage;

    fn plain(name: &str) -> Function {
        Function::new(
            format!("agg::{name}"),
            format!("fn {name}(args: &CallArgs) -> TarryResult<Value> {{ Ok(Value::Unit) }}"),
            |_: &CallArgs| Ok(Value::Unit),
        )
    }

    fn producer(dir: &std::path::Path) -> Stage {
        let producer = plain("producer").default("is_josie_in", false);
        Stage::with_cache_dir(producer, dir).unwrap()
    }

    #[test]
    fn positional_and_named_values() {
        let f = plain("f").param("a").param("b").default("c", 3);
        let agg = aggregate(&f, &Args::new().arg(1).kwarg("b", 2)).unwrap();
        assert_eq!(agg.values["a"], Value::Int(1));
        assert_eq!(agg.values["b"], Value::Int(2));
        assert_eq!(agg.values["c"], Value::Int(3));
    }

    #[test]
    fn supplied_value_beats_literal_default() {
        let f = plain("f").default("num_drivers", 2);
        let agg = aggregate(&f, &Args::new().kwarg("num_drivers", 3)).unwrap();
        assert_eq!(agg.values["num_drivers"], Value::Int(3));
    }

    #[test]
    fn defaults_classify_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let stage = producer(dir.path());
        let num_people = ResultDependency::new(&stage, Args::new()).unwrap();
        let f = plain("f")
            .result("num_people", num_people)
            .uses("helper", FunctionDependency::new(plain("helper")));
        let agg = aggregate(&f, &Args::new()).unwrap();
        assert!(agg.values.is_empty());
        assert!(agg.data_dependencies["num_people"].1.is_none());
        assert!(agg.function_dependencies.contains_key("helper"));
    }

    #[test]
    fn args_override_is_recorded_for_result_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let stage = producer(dir.path());
        let f = plain("f").result(
            "num_people",
            ResultDependency::new(&stage, Args::new()).unwrap(),
        );
        let josie = Args::new().kwarg("is_josie_in", true);
        let call = Args::new().kwarg("num_people", josie);
        let agg = aggregate(&f, &call).unwrap();
        let (_, overrides) = &agg.data_dependencies["num_people"];
        let overrides = overrides.as_ref().unwrap();
        assert!(overrides.named().contains_key("is_josie_in"));
    }

    #[test]
    fn value_replaces_result_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let stage = producer(dir.path());
        let f = plain("f").result(
            "num_people",
            ResultDependency::new(&stage, Args::new()).unwrap(),
        );
        let agg = aggregate(&f, &Args::new().arg(7)).unwrap();
        assert_eq!(agg.values["num_people"], Value::Int(7));
        assert!(agg.data_dependencies.is_empty());
    }

    #[test]
    fn args_override_on_plain_parameter_is_rejected() {
        let f = plain("f").default("x", 1);
        let nested = Args::new().kwarg("x", Args::new());
        let err = aggregate(&f, &nested).unwrap_err();
        assert!(matches!(err, TarryError::OverrideNotAllowed { .. }));
    }

    #[test]
    fn dependency_as_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let stage = producer(dir.path());
        let f = plain("f").param("x");
        let dep = ResultDependency::new(&stage, Args::new()).unwrap();
        let err = aggregate(&f, &Args::new().arg(dep)).unwrap_err();
        assert!(matches!(err, TarryError::DependencyAsValue { .. }));

        let helper = FunctionDependency::new(plain("helper"));
        let err = aggregate(&f, &Args::new().kwarg("x", helper)).unwrap_err();
        assert!(matches!(err, TarryError::DependencyAsValue { .. }));
    }

    #[test]
    fn call_shape_errors() {
        let f = plain("f").param("a");
        assert!(matches!(
            aggregate(&f, &Args::new()).unwrap_err(),
            TarryError::MissingArgument { .. }
        ));
        assert!(matches!(
            aggregate(&f, &Args::new().arg(1).arg(2)).unwrap_err(),
            TarryError::UnexpectedArgument { .. }
        ));
        assert!(matches!(
            aggregate(&f, &Args::new().kwarg("zzz", 1).kwarg("a", 1)).unwrap_err(),
            TarryError::UnexpectedArgument { .. }
        ));
        assert!(matches!(
            aggregate(&f, &Args::new().arg(1).kwarg("a", 1)).unwrap_err(),
            TarryError::DuplicateArgument { .. }
        ));
    }
}
