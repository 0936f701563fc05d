use crate::error::{Result, ResultWithContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Comm target that compiles Vega-Lite into a Vega runtime spec on the frontend
pub const COMPILER_TARGET: &str = "jupyterlab-omnisci:vega-compiler";

/// Comm target that executes query descriptors in the kernel
pub const QUERY_TARGET: &str = "queryibis";

/// Payload of a query request: the handle, the residual transforms, and the current value of
/// every signal and data block the transforms read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub handle: String,

    #[serde(default)]
    pub transform: Vec<Value>,

    #[serde(flatten)]
    pub bindings: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommMessage {
    CompileRequest { id: String, spec: Value },
    CompileResponse { id: String, spec: Value },
    QueryRequest { id: String, data: QueryRequest },
    QueryResponse { id: String, rows: Value },
    SqlRequest { id: String, data: QueryRequest },
    SqlResponse { id: String, sql: String },
    Error { id: String, message: String },
    Display { display_id: String, data: Value },
    UpdateDisplay { display_id: String, data: Value },
}

impl CommMessage {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).with_context(|| format!("Invalid comm message: {text}"))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Correlation id of request and reply messages
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            CommMessage::CompileRequest { id, .. }
            | CommMessage::CompileResponse { id, .. }
            | CommMessage::QueryRequest { id, .. }
            | CommMessage::QueryResponse { id, .. }
            | CommMessage::SqlRequest { id, .. }
            | CommMessage::SqlResponse { id, .. }
            | CommMessage::Error { id, .. } => Some(id),
            CommMessage::Display { .. } | CommMessage::UpdateDisplay { .. } => None,
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            CommMessage::CompileResponse { .. }
                | CommMessage::QueryResponse { .. }
                | CommMessage::SqlResponse { .. }
                | CommMessage::Error { .. }
        )
    }

    /// Comm target the message travels on
    pub fn target(&self) -> Option<&'static str> {
        match self {
            CommMessage::CompileRequest { .. } | CommMessage::CompileResponse { .. } => {
                Some(COMPILER_TARGET)
            }
            CommMessage::QueryRequest { .. }
            | CommMessage::QueryResponse { .. }
            | CommMessage::SqlRequest { .. }
            | CommMessage::SqlResponse { .. } => Some(QUERY_TARGET),
            CommMessage::Error { .. }
            | CommMessage::Display { .. }
            | CommMessage::UpdateDisplay { .. } => None,
        }
    }
}
