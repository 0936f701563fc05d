use crate::connection::ConnectionDescriptor;
use crate::error::Result;
use crate::spec::chart::default_schema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Rewritten Vega runtime specs carrying query descriptors
pub const VEGA_QUERY_MIME_TYPE: &str = "application/vnd.vega.ibis.v5+json";

/// Plain Vega runtime specs, used when query results are inlined as values
pub const VEGA_MIME_TYPE: &str = "application/vnd.vega.v5+json";

pub const VEGA_RENDERER_MIME_TYPE: &str = "application/vnd.heavyai.vega+json";

pub const SQL_EDITOR_MIME_TYPE: &str = "application/vnd.heavyai.sqleditor+json";

lazy_static! {
    /// Chart shown while a spec is compiling, and in place of any spec that could not be
    /// translated
    pub static ref EMPTY_VEGA: Value = json!({
        "$schema": default_schema(),
        "description": "An empty vega v5 spec",
        "width": 500,
        "height": 200,
        "padding": 5,
        "autosize": "pad",
        "signals": [],
        "data": [],
        "scales": [],
        "projections": [],
        "axes": [],
        "legends": [],
        "marks": []
    });

    pub static ref EMPTY_VEGALITE: Value = json!({
        "data": {"values": []},
        "mark": "bar"
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RendererSpec {
    #[serde(rename = "vega")]
    Vega(Value),
    #[serde(rename = "vegaLite")]
    VegaLite(Value),
}

/// Payload rendered by the database-side Vega renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VegaRendererBundle {
    pub connection: ConnectionDescriptor,

    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(flatten)]
    pub spec: RendererSpec,
}

impl VegaRendererBundle {
    pub fn new(
        connection: &ConnectionDescriptor,
        session_id: Option<&str>,
        spec: RendererSpec,
    ) -> Self {
        Self {
            connection: connection.for_session(session_id),
            session_id: session_id.map(String::from),
            spec,
        }
    }

    pub fn to_display_data(&self) -> Result<Value> {
        display_data(VEGA_RENDERER_MIME_TYPE, serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlEditorBundle {
    pub connection: ConnectionDescriptor,

    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default)]
    pub query: String,
}

impl SqlEditorBundle {
    pub fn new(connection: &ConnectionDescriptor, session_id: Option<&str>, query: &str) -> Self {
        Self {
            connection: connection.for_session(session_id),
            session_id: session_id.map(String::from),
            query: query.to_string(),
        }
    }

    pub fn to_display_data(&self) -> Result<Value> {
        display_data(SQL_EDITOR_MIME_TYPE, serde_json::to_value(self)?)
    }
}

/// Wrap a payload in a display message envelope `{"data": {mime: payload}, "metadata": {}}`
pub fn display_data(mime_type: &str, payload: Value) -> Result<Value> {
    let mut data = Map::new();
    data.insert(mime_type.to_string(), payload);
    Ok(json!({ "data": data, "metadata": {} }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: Some("localhost".to_string()),
            port: Some(6274),
            database: Some("omnisci".to_string()),
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            protocol: Some("binary".to_string()),
        }
    }

    #[test]
    fn test_renderer_bundle_with_session() {
        let bundle = VegaRendererBundle::new(
            &connection(),
            Some("s1"),
            RendererSpec::VegaLite(EMPTY_VEGALITE.clone()),
        );
        let display = bundle.to_display_data().unwrap();
        let payload = &display["data"][VEGA_RENDERER_MIME_TYPE];

        assert_eq!(payload["sessionId"], json!("s1"));
        assert_eq!(payload["vegaLite"], *EMPTY_VEGALITE);
        assert!(payload.get("vega").is_none());
        assert!(payload["connection"].get("password").is_none());
        assert_eq!(display["metadata"], json!({}));
    }

    #[test]
    fn test_renderer_bundle_parses_vega_key() {
        let bundle: VegaRendererBundle = serde_json::from_value(json!({
            "connection": {"host": "localhost"},
            "vega": EMPTY_VEGA.clone()
        }))
        .unwrap();
        assert_eq!(bundle.session_id, None);
        assert_eq!(bundle.spec, RendererSpec::Vega(EMPTY_VEGA.clone()));
    }

    #[test]
    fn test_sql_editor_bundle_without_session() {
        let bundle = SqlEditorBundle::new(&connection(), None, "SELECT 1");
        let display = bundle.to_display_data().unwrap();
        let payload = &display["data"][SQL_EDITOR_MIME_TYPE];
        assert_eq!(payload["query"], json!("SELECT 1"));
        assert_eq!(payload["connection"]["password"], json!("secret"));
        assert!(payload.get("sessionId").is_none());
    }

    #[test]
    fn test_empty_vega_is_a_v5_spec() {
        assert_eq!(EMPTY_VEGA["$schema"], json!(default_schema()));
        assert_eq!(EMPTY_VEGA["width"], json!(500));
        assert_eq!(EMPTY_VEGA["marks"], json!([]));
    }
}
