use crate::error::Result;
use crate::spec::transform::parse_transform;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaTransformSpec {
    pub expr: String,

    #[serde(rename = "as")]
    pub as_: String,
}

#[derive(Deserialize)]
struct CalculateTransform {
    calculate: String,
    #[serde(rename = "as")]
    as_: String,
}

impl FormulaTransformSpec {
    pub fn from_vega(value: &Value) -> Result<Self> {
        parse_transform(value)
    }

    pub fn from_vegalite(value: &Value) -> Result<Self> {
        let CalculateTransform { calculate, as_ } = parse_transform(value)?;
        Ok(Self {
            expr: calculate,
            as_,
        })
    }
}
