use crate::error::{Result, VegaQueryError};
use serde_json::{Map, Value};

/// Comparison applied to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicateOp {
    /// Inclusive range, a `None` bound is unbounded
    Range(Option<Value>, Option<Value>),
    Equal(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    OneOf(Vec<Value>),
    Valid(bool),
    /// Operator this crate does not translate, named by its key
    Unrecognized(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPredicateSpec {
    pub field: String,
    pub op: FieldPredicateOp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateSpec {
    Expr(String),
    Field(FieldPredicateSpec),
    And(Vec<PredicateSpec>),
    Or(Vec<PredicateSpec>),
    Not(Box<PredicateSpec>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterTransformSpec {
    pub predicate: PredicateSpec,
}

impl FilterTransformSpec {
    /// `{"type": "filter", "expr": "..."}`
    pub fn from_vega(value: &Value) -> Result<Self> {
        match value.get("expr") {
            Some(Value::String(expr)) => Ok(Self {
                predicate: PredicateSpec::Expr(expr.clone()),
            }),
            _ => Err(VegaQueryError::translation(format!(
                "Filter transform requires a string expr: {value}"
            ))),
        }
    }

    /// `{"filter": <predicate>}`
    pub fn from_vegalite(value: &Value) -> Result<Self> {
        let predicate = value.get("filter").ok_or_else(|| {
            VegaQueryError::translation(format!("Missing filter predicate: {value}"))
        })?;
        Ok(Self {
            predicate: PredicateSpec::from_value(predicate)?,
        })
    }
}

impl PredicateSpec {
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(expr) => Ok(PredicateSpec::Expr(expr.clone())),
            Value::Object(obj) => {
                if let Some(operands) = obj.get("and") {
                    Ok(PredicateSpec::And(Self::from_list(operands)?))
                } else if let Some(operands) = obj.get("or") {
                    Ok(PredicateSpec::Or(Self::from_list(operands)?))
                } else if let Some(operand) = obj.get("not") {
                    Ok(PredicateSpec::Not(Box::new(Self::from_value(operand)?)))
                } else if let Some(Value::String(field)) = obj.get("field") {
                    Ok(PredicateSpec::Field(FieldPredicateSpec {
                        field: field.clone(),
                        op: FieldPredicateOp::from_object(obj)?,
                    }))
                } else {
                    Err(VegaQueryError::translation(format!(
                        "Unsupported filter predicate: {value}"
                    )))
                }
            }
            _ => Err(VegaQueryError::translation(format!(
                "Filter predicate must be a string or object: {value}"
            ))),
        }
    }

    fn from_list(value: &Value) -> Result<Vec<Self>> {
        value
            .as_array()
            .ok_or_else(|| {
                VegaQueryError::translation(format!("Logical operands must be an array: {value}"))
            })?
            .iter()
            .map(Self::from_value)
            .collect()
    }

    pub fn expressions(&self) -> Vec<&str> {
        match self {
            PredicateSpec::Expr(expr) => vec![expr.as_str()],
            PredicateSpec::Field(_) => Vec::new(),
            PredicateSpec::And(ops) | PredicateSpec::Or(ops) => {
                ops.iter().flat_map(|p| p.expressions()).collect()
            }
            PredicateSpec::Not(op) => op.expressions(),
        }
    }
}

impl FieldPredicateOp {
    fn from_object(obj: &Map<String, Value>) -> Result<Self> {
        if obj.contains_key("timeUnit") {
            return Ok(FieldPredicateOp::Unrecognized("timeUnit".to_string()));
        }
        let op = if let Some(range) = obj.get("range") {
            match range.as_array().map(Vec::as_slice) {
                Some([lo, hi]) => {
                    let bound = |v: &Value| (!v.is_null()).then(|| v.clone());
                    FieldPredicateOp::Range(bound(lo), bound(hi))
                }
                _ => {
                    return Err(VegaQueryError::translation(format!(
                        "Range predicate requires a two element array, found {range}"
                    )))
                }
            }
        } else if let Some(v) = obj.get("equal") {
            FieldPredicateOp::Equal(v.clone())
        } else if let Some(v) = obj.get("lt") {
            FieldPredicateOp::Lt(v.clone())
        } else if let Some(v) = obj.get("lte") {
            FieldPredicateOp::Lte(v.clone())
        } else if let Some(v) = obj.get("gt") {
            FieldPredicateOp::Gt(v.clone())
        } else if let Some(v) = obj.get("gte") {
            FieldPredicateOp::Gte(v.clone())
        } else if let Some(v) = obj.get("oneOf") {
            match v {
                Value::Array(values) => FieldPredicateOp::OneOf(values.clone()),
                _ => {
                    return Err(VegaQueryError::translation(format!(
                        "oneOf predicate requires an array, found {v}"
                    )))
                }
            }
        } else if let Some(v) = obj.get("valid") {
            FieldPredicateOp::Valid(v.as_bool().unwrap_or(true))
        } else {
            let name = obj
                .keys()
                .find(|k| k.as_str() != "field")
                .cloned()
                .unwrap_or_default();
            FieldPredicateOp::Unrecognized(name)
        };
        Ok(op)
    }
}
