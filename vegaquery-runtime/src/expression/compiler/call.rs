use crate::expression::compiler::builtin_functions::math::math_function;
use crate::expression::compiler::builtin_functions::vl_selection_test::{vl_selection_test, Op};
use crate::expression::compiler::compile;
use crate::expression::compiler::config::CompilationConfig;
use crate::expression::compiler::constant::{constant_value, json_to_lit};
use datafusion_common::DFSchema;
use datafusion_expr::{lit, Expr};
use serde_json::Value;
use std::str::FromStr;
use vegaquery_common::arrow::datatypes::DataType;
use vegaquery_common::datatypes::{cast_to, to_boolean, to_numeric};
use vegaquery_common::error::{Result, VegaQueryError};
use vegaquery_core::expression::ast::Expression;

pub fn compile_call(
    callee: &str,
    args: &[Expression],
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    match callee {
        "vlSelectionTest" => compile_vl_selection_test(args, config, schema),
        "inrange" => {
            check_arity(callee, args, 2)?;
            let value = compile(&args[0], config, schema)?;
            let range = constant_value(&args[1], config);
            match range.as_ref().and_then(Value::as_array).map(Vec::as_slice) {
                Some([lo, hi]) => {
                    let (lo, hi) = match (lo.as_f64(), hi.as_f64()) {
                        (Some(a), Some(b)) if a > b => (hi, lo),
                        _ => (lo, hi),
                    };
                    Ok(value.between(json_to_lit(lo)?, json_to_lit(hi)?))
                }
                _ => Err(VegaQueryError::compilation(format!(
                    "inrange requires a constant two element range, found {}",
                    args[1]
                ))),
            }
        }
        "isValid" => {
            check_arity(callee, args, 1)?;
            Ok(compile(&args[0], config, schema)?.is_not_null())
        }
        "length" => {
            check_arity(callee, args, 1)?;
            match constant_value(&args[0], config) {
                Some(Value::Array(values)) => Ok(lit(values.len() as i64)),
                Some(Value::String(s)) => Ok(lit(s.chars().count() as i64)),
                _ => Err(VegaQueryError::compilation(format!(
                    "length is only supported for constant arrays and strings, found {}",
                    args[0]
                ))),
            }
        }
        "toNumber" => {
            check_arity(callee, args, 1)?;
            to_numeric(compile(&args[0], config, schema)?, schema)
        }
        "toBoolean" => {
            check_arity(callee, args, 1)?;
            to_boolean(compile(&args[0], config, schema)?, schema)
        }
        "toString" => {
            check_arity(callee, args, 1)?;
            cast_to(compile(&args[0], config, schema)?, &DataType::Utf8, schema)
        }
        "data" | "indata" => Err(VegaQueryError::compilation(format!(
            "No value bound for data reference in {callee}({})",
            args.first().map(|a| a.to_string()).unwrap_or_default()
        ))),
        _ => {
            if args.len() == 1 {
                let arg = compile(&args[0], config, schema)?;
                if let Some(expr) = math_function(callee, arg, schema)? {
                    return Ok(expr);
                }
            }
            Err(VegaQueryError::compilation(format!(
                "Unsupported function {callee} with {} arguments",
                args.len()
            )))
        }
    }
}

/// `vlSelectionTest(store, datum, op)` where the store has already been replaced by its value
fn compile_vl_selection_test(
    args: &[Expression],
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    if !(2..=3).contains(&args.len()) {
        return Err(VegaQueryError::compilation(format!(
            "vlSelectionTest requires 2 or 3 arguments, received {}",
            args.len()
        )));
    }
    let store = match constant_value(&args[0], config) {
        Some(Value::String(name)) => config.signal_scope.get(&name).cloned().ok_or_else(|| {
            VegaQueryError::compilation(format!("No value bound for selection store {name}"))
        })?,
        Some(store) => store,
        None => {
            return Err(VegaQueryError::compilation(format!(
                "Selection store must be a constant, found {}",
                args[0]
            )))
        }
    };
    if args[1].as_identifier() != Some("datum") {
        return Err(VegaQueryError::compilation(format!(
            "vlSelectionTest second argument must be datum, found {}",
            args[1]
        )));
    }
    let op = match args.get(2).map(|arg| constant_value(arg, config)) {
        None => Op::Union,
        Some(Some(Value::String(op))) => Op::from_str(&op)?,
        Some(other) => {
            return Err(VegaQueryError::compilation(format!(
                "Invalid vlSelectionTest operation: {other:?}"
            )))
        }
    };
    vl_selection_test(&store, op, schema)
}

fn check_arity(callee: &str, args: &[Expression], n: usize) -> Result<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(VegaQueryError::compilation(format!(
            "{callee} requires {n} argument(s), received {}",
            args.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use crate::expression::compiler::compile_str;
    use crate::expression::compiler::config::CompilationConfig;
    use datafusion_common::DFSchema;
    use datafusion_expr::{col, lit};
    use serde_json::json;
    use vegaquery_common::arrow::datatypes::{DataType, Field, Schema};
    use vegaquery_common::error::VegaQueryError;

    fn schema() -> DFSchema {
        DFSchema::try_from(Schema::new(vec![
            Field::new("a", DataType::Utf8, true),
            Field::new("b", DataType::Int64, true),
        ]))
        .unwrap()
    }

    #[test]
    fn test_inrange_normalizes_bounds() {
        let expr = compile_str(
            "inrange(datum.b, [10, 0])",
            &CompilationConfig::default(),
            &schema(),
        )
        .unwrap();
        assert_eq!(expr, col("b").between(lit(0i64), lit(10i64)));
    }

    #[test]
    fn test_length_of_substituted_store() {
        let expr = compile_str(
            "length([{\"values\": [1]}])",
            &CompilationConfig::default(),
            &schema(),
        )
        .unwrap();
        assert_eq!(expr, lit(1i64));
    }

    #[test]
    fn test_selection_store_from_bound_name() {
        let config = CompilationConfig::from_bindings(
            json!({"brush_store": [{"fields": [{"field": "a", "type": "E"}], "values": ["x"]}]})
                .as_object()
                .unwrap(),
        );
        let expr = compile_str("vlSelectionTest('brush_store', datum)", &config, &schema())
            .unwrap();
        assert_eq!(expr, col("a").eq(lit("x")));
    }

    #[test]
    fn test_unbound_data_reference_is_error() {
        let err = compile_str(
            "length(data('brush_store'))",
            &CompilationConfig::default(),
            &schema(),
        )
        .unwrap_err();
        assert!(matches!(err, VegaQueryError::CompilationError(..)));
    }

    #[test]
    fn test_unknown_function_is_error() {
        assert!(compile_str("sampleLogNormal()", &CompilationConfig::default(), &schema()).is_err());
    }

    #[test]
    fn test_math_function() {
        assert!(compile_str("abs(datum.b) > 2", &CompilationConfig::default(), &schema()).is_ok());
    }
}
