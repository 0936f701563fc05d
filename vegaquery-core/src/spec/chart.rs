use crate::error::{Result, ResultWithContext};
use crate::spec::data::DataSpec;
use crate::spec::signal::SignalSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Vega runtime specification. Only the parts the rewriter touches are typed; everything
/// else is kept verbatim in `extra`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub data: Vec<DataSpec>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn default_schema() -> String {
    String::from("https://vega.github.io/schema/vega/v5.json")
}

impl ChartSpec {
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .with_context(|| "Failed to parse Vega specification".to_string())
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn get_data(&self, name: &str) -> Option<&DataSpec> {
        self.data.iter().find(|d| d.name == name)
    }

    pub fn get_data_mut(&mut self, name: &str) -> Option<&mut DataSpec> {
        self.data.iter_mut().find(|d| d.name == name)
    }

    /// Top-level signal definitions
    pub fn signals(&self) -> Result<Vec<SignalSpec>> {
        match self.extra.get("signals") {
            None => Ok(Vec::new()),
            Some(signals) => serde_json::from_value(signals.clone())
                .with_context(|| "Failed to parse signal definitions".to_string()),
        }
    }

    pub fn signal_names(&self) -> Result<Vec<String>> {
        Ok(self.signals()?.into_iter().map(|s| s.name).collect())
    }
}
