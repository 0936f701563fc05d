use crate::error::{Result, VegaQueryError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSpec {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataSpec {
    pub fn is_root(&self) -> bool {
        self.source.is_none()
    }

    /// Name of the single upstream block, if this block derives from exactly one
    pub fn single_source(&self) -> Option<&str> {
        match &self.source {
            Some(SourceSpec::Single(name)) => Some(name),
            _ => None,
        }
    }

    /// Splice `parent_transforms` ahead of this block's own transforms and detach it from its
    /// source
    pub fn splice_source(&mut self, parent_name: &str, parent_transforms: &[Value]) -> Result<()> {
        if self.single_source() != Some(parent_name) {
            return Err(VegaQueryError::internal(format!(
                "Cannot splice {parent_name:?} into data block {:?} with source {:?}",
                self.name, self.source
            )));
        }
        let mut transforms = parent_transforms.to_vec();
        transforms.append(&mut self.transform);
        self.transform = transforms;
        self.source = None;
        Ok(())
    }
}
