use crate::error::{Result, VegaQueryError};
use datafusion_common::ScalarValue;
use serde_json::Value;

pub trait ScalarValueHelpers {
    fn from_json(value: &Value) -> Result<ScalarValue>;
    fn to_json(&self) -> Result<Value>;
    fn to_f64(&self) -> Result<f64>;
}

impl ScalarValueHelpers for ScalarValue {
    fn from_json(value: &Value) -> Result<ScalarValue> {
        let scalar = match value {
            Value::Null => ScalarValue::Null,
            Value::Bool(v) => ScalarValue::from(*v),
            Value::Number(v) => {
                if let Some(i) = v.as_i64() {
                    ScalarValue::from(i)
                } else if let Some(f) = v.as_f64() {
                    ScalarValue::from(f)
                } else {
                    return Err(VegaQueryError::internal(format!(
                        "Number {v} cannot be represented as a scalar"
                    )));
                }
            }
            Value::String(s) => ScalarValue::from(s.as_str()),
            Value::Array(_) | Value::Object(_) => {
                return Err(VegaQueryError::internal(format!(
                    "Only primitive JSON values convert to scalars, received {value}"
                )))
            }
        };
        Ok(scalar)
    }

    fn to_json(&self) -> Result<Value> {
        let value = match self {
            ScalarValue::Null => Value::Null,
            ScalarValue::Boolean(Some(v)) => Value::from(*v),
            ScalarValue::Float32(Some(v)) => Value::from(*v as f64),
            ScalarValue::Float64(Some(v)) => Value::from(*v),
            ScalarValue::Int8(Some(v)) => Value::from(*v),
            ScalarValue::Int16(Some(v)) => Value::from(*v),
            ScalarValue::Int32(Some(v)) => Value::from(*v),
            ScalarValue::Int64(Some(v)) => Value::from(*v),
            ScalarValue::UInt8(Some(v)) => Value::from(*v),
            ScalarValue::UInt16(Some(v)) => Value::from(*v),
            ScalarValue::UInt32(Some(v)) => Value::from(*v),
            ScalarValue::UInt64(Some(v)) => Value::from(*v),
            ScalarValue::Utf8(Some(v)) | ScalarValue::LargeUtf8(Some(v)) => {
                Value::from(v.as_str())
            }
            scalar if scalar.is_null() => Value::Null,
            scalar => {
                return Err(VegaQueryError::internal(format!(
                    "Unsupported scalar for JSON conversion: {scalar:?}"
                )))
            }
        };
        Ok(value)
    }

    fn to_f64(&self) -> Result<f64> {
        Ok(match self {
            ScalarValue::Float32(Some(e)) => *e as f64,
            ScalarValue::Float64(Some(e)) => *e,
            ScalarValue::Int8(Some(e)) => *e as f64,
            ScalarValue::Int16(Some(e)) => *e as f64,
            ScalarValue::Int32(Some(e)) => *e as f64,
            ScalarValue::Int64(Some(e)) => *e as f64,
            ScalarValue::UInt8(Some(e)) => *e as f64,
            ScalarValue::UInt16(Some(e)) => *e as f64,
            ScalarValue::UInt32(Some(e)) => *e as f64,
            ScalarValue::UInt64(Some(e)) => *e as f64,
            _ => {
                return Err(VegaQueryError::internal(format!(
                    "Cannot convert {self} to f64"
                )))
            }
        })
    }
}
