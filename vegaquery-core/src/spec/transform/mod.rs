pub mod aggregate;
pub mod filter;
pub mod formula;
pub mod groupby;

use crate::error::{Result, ResultWithContext, VegaQueryError};
use crate::spec::transform::aggregate::AggregateTransformSpec;
use crate::spec::transform::filter::FilterTransformSpec;
use crate::spec::transform::formula::FormulaTransformSpec;
use crate::spec::transform::groupby::GroupbyTransformSpec;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Transform type of the opaque descriptor that replaces transforms on registry-backed data
pub const QUERY_TRANSFORM_TYPE: &str = "queryibis";

/// Field reference, either a bare name or `{"field": name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    String(String),
    Object(FieldObject),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldObject {
    pub field: String,
}

impl Field {
    pub fn field(&self) -> String {
        match self {
            Field::String(field) => field.clone(),
            Field::Object(FieldObject { field }) => field.clone(),
        }
    }
}

/// One step of a data block's transform list. Both the Vega form (`{"type": ...}`) and the
/// Vega-Lite keyed form (`{"aggregate": ...}`, `{"filter": ...}`) are accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Groupby(GroupbyTransformSpec),
    Aggregate(AggregateTransformSpec),
    Filter(FilterTransformSpec),
    Formula(FormulaTransformSpec),
    Unsupported(Value),
}

impl TransformSpec {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            VegaQueryError::translation(format!("Transform must be an object, found {value}"))
        })?;

        let parsed = if let Some(Value::String(typ)) = obj.get("type") {
            match typ.as_str() {
                "aggregate" => {
                    TransformSpec::Aggregate(AggregateTransformSpec::from_vega(value)?)
                }
                "filter" => TransformSpec::Filter(FilterTransformSpec::from_vega(value)?),
                "formula" => TransformSpec::Formula(FormulaTransformSpec::from_vega(value)?),
                _ => TransformSpec::Unsupported(value.clone()),
            }
        } else if obj.contains_key("aggregate") {
            TransformSpec::Aggregate(AggregateTransformSpec::from_vegalite(value)?)
        } else if obj.contains_key("groupby") {
            TransformSpec::Groupby(GroupbyTransformSpec::from_vegalite(value)?)
        } else if obj.contains_key("filter") {
            TransformSpec::Filter(FilterTransformSpec::from_vegalite(value)?)
        } else if obj.contains_key("calculate") {
            TransformSpec::Formula(FormulaTransformSpec::from_vegalite(value)?)
        } else {
            TransformSpec::Unsupported(value.clone())
        };
        Ok(parsed)
    }

    pub fn from_values(values: &[Value]) -> Result<Vec<Self>> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Self::from_value(v).with_context(|| format!("Failed to parse transform {i}: {v}"))
            })
            .collect()
    }

    pub fn kind(&self) -> &str {
        match self {
            TransformSpec::Groupby(_) => "groupby",
            TransformSpec::Aggregate(_) => "aggregate",
            TransformSpec::Filter(_) => "filter",
            TransformSpec::Formula(_) => "formula",
            TransformSpec::Unsupported(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    /// Vega expression strings carried by this transform
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            TransformSpec::Filter(filter) => filter.predicate.expressions(),
            TransformSpec::Formula(formula) => vec![formula.expr.as_str()],
            _ => Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for TransformSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        TransformSpec::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Deserialize a transform object into its typed form, reporting failures as translation errors
pub(crate) fn parse_transform<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|err| {
        VegaQueryError::translation(format!("Invalid transform {value}: {err}"))
    })
}
