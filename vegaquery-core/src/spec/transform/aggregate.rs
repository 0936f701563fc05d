use crate::error::{Result, VegaQueryError};
use crate::spec::transform::{parse_transform, Field};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOpSpec {
    Count,
    Valid,
    Missing,
    Distinct,
    Sum,
    Mean,
    Average,
    Median,
    Min,
    Max,
    Variance,
    Variancep,
    Stdev,
    Stdevp,
}

impl AggregateOpSpec {
    pub fn name(&self) -> &'static str {
        use AggregateOpSpec::*;
        match self {
            Count => "count",
            Valid => "valid",
            Missing => "missing",
            Distinct => "distinct",
            Sum => "sum",
            Mean => "mean",
            Average => "average",
            Median => "median",
            Min => "min",
            Max => "max",
            Variance => "variance",
            Variancep => "variancep",
            Stdev => "stdev",
            Stdevp => "stdevp",
        }
    }

    /// `average` is a synonym of `mean`
    pub fn canonical(&self) -> Self {
        match self {
            AggregateOpSpec::Average => AggregateOpSpec::Mean,
            op => *op,
        }
    }
}

impl fmt::Display for AggregateOpSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One named reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub op: AggregateOpSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_: Option<String>,
}

impl AggregateSpec {
    /// Output column name, defaulting to `<op>_<field>` (or `<op>` without a field)
    pub fn output_name(&self) -> String {
        match (&self.as_, &self.field) {
            (Some(as_), _) => as_.clone(),
            (None, Some(field)) => format!("{}_{}", self.op, field),
            (None, None) => self.op.to_string(),
        }
    }
}

/// Grouped reduction, normalized from either transform form
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTransformSpec {
    pub groupby: Vec<String>,
    pub aggregates: Vec<AggregateSpec>,
}

#[derive(Deserialize)]
struct VegaAggregate {
    #[serde(default)]
    groupby: Vec<Field>,
    fields: Option<Vec<Option<Field>>>,
    ops: Option<Vec<AggregateOpSpec>>,
    #[serde(rename = "as")]
    as_: Option<Vec<Option<String>>>,
}

#[derive(Deserialize)]
struct VegaLiteAggregate {
    #[serde(default)]
    groupby: Vec<Field>,
    aggregate: Vec<AggregateSpec>,
}

impl AggregateTransformSpec {
    /// `{"type": "aggregate", "groupby", "fields", "ops", "as"}`
    pub fn from_vega(value: &Value) -> Result<Self> {
        let spec: VegaAggregate = parse_transform(value)?;
        let ops = spec.ops.unwrap_or_else(|| vec![AggregateOpSpec::Count]);
        let fields = spec.fields.unwrap_or_default();
        let as_ = spec.as_.unwrap_or_default();
        if fields.len() > ops.len() {
            return Err(VegaQueryError::translation(format!(
                "Aggregate has {} fields but only {} ops: {value}",
                fields.len(),
                ops.len()
            )));
        }

        let aggregates = ops
            .into_iter()
            .enumerate()
            .map(|(i, op)| AggregateSpec {
                op,
                field: fields.get(i).cloned().flatten().map(|f| f.field()),
                as_: as_.get(i).cloned().flatten(),
            })
            .collect();

        Ok(Self {
            groupby: spec.groupby.iter().map(Field::field).collect(),
            aggregates,
        })
    }

    /// `{"aggregate": [{"op", "field", "as"}], "groupby": [..]}`
    pub fn from_vegalite(value: &Value) -> Result<Self> {
        let spec: VegaLiteAggregate = parse_transform(value)?;
        Ok(Self {
            groupby: spec.groupby.iter().map(Field::field).collect(),
            aggregates: spec.aggregate,
        })
    }
}
