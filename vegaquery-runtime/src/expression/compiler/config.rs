use serde_json::{Map, Value};
use std::collections::HashMap;

/// Values that identifiers resolve to while compiling an expression
#[derive(Clone, Debug, Default)]
pub struct CompilationConfig {
    pub signal_scope: HashMap<String, Value>,
}

impl CompilationConfig {
    pub fn from_bindings(bindings: &Map<String, Value>) -> Self {
        Self {
            signal_scope: bindings
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }
}
