use crate::arrow::datatypes::{DataType, Schema};
use crate::error::{Result, VegaQueryError};
use serde_json::{json, Map, Value};
use vegaquery_common::datatypes::{is_numeric_datatype, is_temporal_datatype};

/// Binds a Vega-Lite chart to a registered query expression.
///
/// The chart's inline data is replaced by a named data reference to the handle, and encoding
/// channels without an explicit `type` get one inferred from the expression's schema.
pub struct ChartAdapter;

impl ChartAdapter {
    pub fn bind(vegalite_spec: &Value, handle: &str, schema: &Schema) -> Result<Value> {
        let Value::Object(spec) = vegalite_spec else {
            return Err(VegaQueryError::specification(format!(
                "Vega-Lite spec must be an object, found {vegalite_spec}"
            )));
        };
        let mut spec = spec.clone();
        spec.insert("data".to_string(), json!({ "name": handle }));
        infer_encoding_types(&mut spec, schema);
        Ok(Value::Object(spec))
    }
}

/// Vega-Lite measurement type for an Arrow column type
pub fn infer_vegalite_type(dtype: &DataType) -> &'static str {
    if is_numeric_datatype(dtype) {
        "quantitative"
    } else if is_temporal_datatype(dtype) {
        "temporal"
    } else {
        "nominal"
    }
}

fn infer_encoding_types(spec: &mut Map<String, Value>, schema: &Schema) {
    if let Some(Value::Object(encoding)) = spec.get_mut("encoding") {
        for channel in encoding.values_mut() {
            match channel {
                Value::Array(defs) => {
                    for def in defs {
                        infer_channel_type(def, schema);
                    }
                }
                def => infer_channel_type(def, schema),
            }
        }
    }
    // Faceted and repeated charts keep their encodings on an inner spec
    if let Some(Value::Object(inner)) = spec.get_mut("spec") {
        infer_encoding_types(inner, schema);
    }
}

fn infer_channel_type(def: &mut Value, schema: &Schema) {
    let Value::Object(def) = def else {
        return;
    };
    if def.contains_key("type") {
        return;
    }
    let name = match (def.get("field"), def.get("shorthand")) {
        (Some(Value::String(field)), _) => field.clone(),
        (None, Some(Value::String(shorthand))) => match parse_shorthand(shorthand) {
            (_, Some(_)) => return,
            (field, None) => field,
        },
        _ => return,
    };
    if let Ok(field) = schema.field_with_name(&name) {
        let typ = infer_vegalite_type(field.data_type());
        def.insert("type".to_string(), json!(typ));
    }
}

/// Split Altair shorthand like `b:Q` or `mean(b)` into field name and explicit type code
fn parse_shorthand(shorthand: &str) -> (String, Option<String>) {
    let (field, typ) = match shorthand.rsplit_once(':') {
        Some((field, typ)) => (field, Some(typ.to_string())),
        None => (shorthand, None),
    };
    let field = match (field.find('('), field.strip_suffix(')')) {
        (Some(open), Some(inner)) => &inner[open + 1..],
        _ => field,
    };
    (field.to_string(), typ)
}
