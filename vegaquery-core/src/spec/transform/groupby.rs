use crate::error::Result;
use crate::spec::transform::{parse_transform, Field};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relational grouping that applies to the next aggregate in the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupbyTransformSpec {
    pub groupby: Vec<Field>,
}

impl GroupbyTransformSpec {
    pub fn from_vegalite(value: &Value) -> Result<Self> {
        parse_transform(value)
    }

    pub fn fields(&self) -> Vec<String> {
        self.groupby.iter().map(Field::field).collect()
    }
}
