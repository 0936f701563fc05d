use crate::expression::compiler::config::CompilationConfig;
use datafusion_common::ScalarValue;
use datafusion_expr::{lit, Expr};
use serde_json::{Map, Value};
use std::collections::HashMap;
use vegaquery_common::data::scalar::ScalarValueHelpers;
use vegaquery_common::error::{Result, VegaQueryError};
use vegaquery_core::expression::ast::{Expression, UnaryOperator};

lazy_static! {
    static ref CONSTANTS: HashMap<&'static str, f64> = vec![
        ("NaN", f64::NAN),
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("PI", std::f64::consts::PI),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("SQRT2", std::f64::consts::SQRT_2),
        ("MIN_VALUE", f64::MIN_POSITIVE),
        ("MAX_VALUE", f64::MAX),
    ]
    .into_iter()
    .collect();
}

/// Evaluate an expression that does not depend on `datum` to a JSON value. Returns `None` when
/// the expression needs row data or calls a function.
pub fn constant_value(expr: &Expression, config: &CompilationConfig) -> Option<Value> {
    match expr {
        Expression::Literal(_) => expr.to_json_literal(),
        Expression::Identifier(name) => {
            if let Some(value) = config.signal_scope.get(name) {
                Some(value.clone())
            } else {
                CONSTANTS
                    .get(name.as_str())
                    .map(|v| serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number))
            }
        }
        Expression::Unary {
            op: UnaryOperator::Neg,
            argument,
        } => match constant_value(argument, config)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Value::from(-i)),
                None => n.as_f64().map(|f| Value::from(-f)),
            },
            _ => None,
        },
        Expression::Array(elements) => elements
            .iter()
            .map(|e| constant_value(e, config))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        Expression::Object(props) => props
            .iter()
            .map(|(k, v)| constant_value(v, config).map(|v| (k.clone(), v)))
            .collect::<Option<Map<_, _>>>()
            .map(Value::Object),
        Expression::Member {
            object,
            property,
            computed,
        } => {
            let object = constant_value(object, config)?;
            let key = if *computed {
                constant_value(property, config)?
            } else {
                Value::String(property.as_identifier()?.to_string())
            };
            match (&object, &key) {
                (Value::Object(obj), Value::String(k)) => obj.get(k).cloned(),
                (Value::Array(arr), Value::Number(i)) => arr.get(i.as_u64()? as usize).cloned(),
                (Value::Array(arr), Value::String(k)) if k == "length" => {
                    Some(Value::from(arr.len()))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// Literal expression for a scalar JSON value
pub fn json_to_lit(value: &Value) -> Result<Expr> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(VegaQueryError::compilation(format!(
            "Expected a scalar value, found {value}"
        ))),
        _ => Ok(lit(ScalarValue::from_json(value)?)),
    }
}
