use crate::error::{Result, ResultWithContext, VegaQueryError};
use crate::expression::parser::parse;
use crate::spec::chart::ChartSpec;
use crate::spec::data::DataSpec;
use crate::spec::transform::{TransformSpec, QUERY_TRANSFORM_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Opaque transform that replaces the native transforms of registry-backed data.
///
/// Serializes as `{"type": "queryibis", "handle": .., "transform": [..], <binding>: {"signal": ..}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    #[serde(rename = "type")]
    pub type_: String,

    pub handle: String,

    #[serde(default)]
    pub transform: Vec<Value>,

    #[serde(flatten)]
    pub bindings: Map<String, Value>,
}

impl QueryDescriptor {
    pub fn new(handle: &str, transform: Vec<Value>) -> Self {
        Self {
            type_: QUERY_TRANSFORM_TYPE.to_string(),
            handle: handle.to_string(),
            transform,
            bindings: Default::default(),
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        if value.get("type").and_then(Value::as_str) != Some(QUERY_TRANSFORM_TYPE) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Handle and accumulated residual transforms of a block that has been rewritten
#[derive(Debug, Clone, PartialEq)]
struct Processed {
    handle: String,
    residual: Vec<Value>,
}

/// Rewrites a compiled Vega spec so that every data block backed by a registered query
/// expression carries a single query descriptor instead of native transforms
pub struct SpecRewriter<'a> {
    is_handle: &'a dyn Fn(&str) -> bool,
}

impl<'a> SpecRewriter<'a> {
    pub fn new(is_handle: &'a dyn Fn(&str) -> bool) -> Self {
        Self { is_handle }
    }

    pub fn rewrite(&self, spec: &ChartSpec) -> Result<ChartSpec> {
        let mut spec = spec.clone();
        let signal_names: HashSet<String> = spec.signal_names()?.into_iter().collect();
        let data_names: HashSet<String> = spec.data.iter().map(|d| d.name.clone()).collect();
        let mut processed: HashMap<String, Processed> = HashMap::new();

        // Each pass rewrites the first eligible block in spec order, roots before derived blocks
        let mut pass = 0;
        while let Some((index, done)) = self.next_match(&spec.data, &processed)? {
            pass += 1;
            let block = &mut spec.data[index];
            log::debug!(
                "Rewrite pass {pass}: {} using handle {}",
                block.name,
                done.handle
            );
            let descriptor =
                make_descriptor(&done, &signal_names, &data_names).with_context(|| {
                    format!("Failed to build query descriptor for data {:?}", block.name)
                })?;
            block.source = None;
            block.transform = vec![descriptor.to_value()?];
            processed.insert(block.name.clone(), done);
        }

        Ok(spec)
    }

    /// Index of the next block to rewrite, with its handle and full residual transform list
    fn next_match(
        &self,
        data: &[DataSpec],
        processed: &HashMap<String, Processed>,
    ) -> Result<Option<(usize, Processed)>> {
        let root = data.iter().enumerate().find(|(_, d)| {
            d.is_root() && !processed.contains_key(&d.name) && (self.is_handle)(&d.name)
        });
        if let Some((index, block)) = root {
            return Ok(Some((
                index,
                Processed {
                    handle: block.name.clone(),
                    residual: block.transform.clone(),
                },
            )));
        }

        for (index, block) in data.iter().enumerate() {
            if processed.contains_key(&block.name) {
                continue;
            }
            let Some(parent) = block.single_source().and_then(|s| processed.get(s)) else {
                continue;
            };
            let mut spliced = block.clone();
            spliced.splice_source(
                block.single_source().unwrap_or_default(),
                &parent.residual,
            )?;
            return Ok(Some((
                index,
                Processed {
                    handle: parent.handle.clone(),
                    residual: spliced.transform,
                },
            )));
        }
        Ok(None)
    }
}

/// Build the descriptor, binding every signal and data block that residual expressions read
fn make_descriptor(
    processed: &Processed,
    signal_names: &HashSet<String>,
    data_names: &HashSet<String>,
) -> Result<QueryDescriptor> {
    let mut data_refs: BTreeMap<String, Value> = BTreeMap::new();
    let mut signal_refs: BTreeMap<String, Value> = BTreeMap::new();

    for (i, value) in processed.residual.iter().enumerate() {
        if !value.is_object() {
            return Err(VegaQueryError::translation(format!(
                "Transform {i} is not an object: {value}"
            )));
        }
        // Transforms that fail to parse are carried verbatim for the executor to report
        let Ok(tx) = TransformSpec::from_value(value) else {
            continue;
        };
        for expr_str in tx.expressions() {
            let expr = match parse(expr_str) {
                Ok(expr) => expr,
                Err(err) => {
                    log::warn!("Leaving unparseable expression {expr_str:?} untranslated: {err}");
                    continue;
                }
            };
            let refs = expr.input_references();
            for name in refs.data_names.into_iter().filter(|n| data_names.contains(n)) {
                let signal = format!("data({})", Value::String(name.clone()));
                data_refs.insert(name, json!({ "signal": signal }));
            }
            for name in refs
                .signal_names
                .into_iter()
                .filter(|n| signal_names.contains(n))
            {
                signal_refs.insert(name.clone(), json!({ "signal": name }));
            }
        }
    }

    let mut descriptor = QueryDescriptor::new(&processed.handle, processed.residual.clone());
    for (name, binding) in signal_refs.into_iter().chain(data_refs) {
        if name == "type" || name == "handle" || name == "transform" {
            return Err(VegaQueryError::translation(format!(
                "Binding name {name:?} collides with a query descriptor property"
            )));
        }
        descriptor.bindings.insert(name, binding);
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(spec: Value, handles: &[&str]) -> Value {
        let handles: Vec<String> = handles.iter().map(|h| h.to_string()).collect();
        let is_handle = move |name: &str| handles.iter().any(|h| h == name);
        let chart = ChartSpec::from_value(&spec).unwrap();
        SpecRewriter::new(&is_handle)
            .rewrite(&chart)
            .unwrap()
            .to_value()
            .unwrap()
    }

    #[test]
    fn test_root_and_derived_block() {
        let result = rewrite(
            json!({
                "data": [
                    {"name": "ibis-1"},
                    {"name": "data_0", "source": "ibis-1", "transform": [
                        {"groupby": ["a"]},
                        {"aggregate": [{"op": "mean", "field": "b", "as": "avg_b"}]}
                    ]}
                ]
            }),
            &["ibis-1"],
        );

        assert_eq!(
            result,
            json!({
                "data": [
                    {"name": "ibis-1", "transform": [
                        {"type": "queryibis", "handle": "ibis-1", "transform": []}
                    ]},
                    {"name": "data_0", "transform": [
                        {"type": "queryibis", "handle": "ibis-1", "transform": [
                            {"groupby": ["a"]},
                            {"aggregate": [{"op": "mean", "field": "b", "as": "avg_b"}]}
                        ]}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn test_chain_accumulates_residuals() {
        let result = rewrite(
            json!({
                "data": [
                    {"name": "ibis-1", "transform": [{"type": "filter", "expr": "datum.a > 0"}]},
                    {"name": "mid", "source": "ibis-1", "transform": [{"groupby": ["a"]}]},
                    {"name": "leaf", "source": "mid", "transform": [
                        {"aggregate": [{"op": "count", "as": "n"}]}
                    ]}
                ]
            }),
            &["ibis-1"],
        );

        assert_eq!(
            result["data"][2]["transform"][0]["transform"],
            json!([
                {"type": "filter", "expr": "datum.a > 0"},
                {"groupby": ["a"]},
                {"aggregate": [{"op": "count", "as": "n"}]}
            ])
        );
    }

    #[test]
    fn test_diamond_duplicates_shared_parent() {
        let result = rewrite(
            json!({
                "data": [
                    {"name": "ibis-1", "transform": [{"type": "filter", "expr": "datum.a > 0"}]},
                    {"name": "left", "source": "ibis-1", "transform": [{"groupby": ["a"]}]},
                    {"name": "right", "source": "ibis-1", "transform": [{"groupby": ["b"]}]}
                ]
            }),
            &["ibis-1"],
        );

        for (i, key) in [(1, "a"), (2, "b")] {
            assert_eq!(
                result["data"][i]["transform"][0]["transform"],
                json!([{"type": "filter", "expr": "datum.a > 0"}, {"groupby": [key]}])
            );
        }
    }

    #[test]
    fn test_unmatched_blocks_pass_through() {
        let spec = json!({
            "data": [
                {"name": "source_0", "values": [{"a": 1}]},
                {"name": "data_0", "source": "source_0", "transform": [{"type": "filter", "expr": "datum.a"}]},
                {"name": "both", "source": ["ibis-1", "source_0"]},
                {"name": "ibis-1"}
            ]
        });
        let result = rewrite(spec.clone(), &["ibis-1"]);
        assert_eq!(result["data"][0], spec["data"][0]);
        assert_eq!(result["data"][1], spec["data"][1]);
        assert_eq!(result["data"][2], spec["data"][2]);
    }

    #[test]
    fn test_bindings_for_selection_store_and_signals() {
        let result = rewrite(
            json!({
                "signals": [{"name": "threshold", "value": 2}],
                "data": [
                    {"name": "brush_store"},
                    {"name": "ibis-1"},
                    {"name": "data_0", "source": "ibis-1", "transform": [
                        {"type": "filter", "expr": "!length(data(\"brush_store\")) || vlSelectionTest(\"brush_store\", datum)"},
                        {"type": "filter", "expr": "datum.b > threshold"}
                    ]}
                ]
            }),
            &["ibis-1"],
        );

        let descriptor = &result["data"][2]["transform"][0];
        assert_eq!(descriptor["threshold"], json!({"signal": "threshold"}));
        assert_eq!(
            descriptor["brush_store"],
            json!({"signal": "data(\"brush_store\")"})
        );
        // The store block is not registry-backed, so it is untouched
        assert_eq!(result["data"][0], json!({"name": "brush_store"}));
    }

    #[test]
    fn test_non_object_transform_is_translation_error() {
        let chart = ChartSpec::from_value(&json!({
            "data": [{"name": "ibis-1", "transform": ["bogus"]}]
        }))
        .unwrap();
        let is_handle = |name: &str| name == "ibis-1";
        let err = SpecRewriter::new(&is_handle).rewrite(&chart).unwrap_err();
        assert!(matches!(err, VegaQueryError::TranslationError(..)));
    }

    #[test]
    fn test_descriptor_round_trip() {
        let value = json!({
            "type": "queryibis",
            "handle": "ibis-1",
            "transform": [{"groupby": ["a"]}],
            "threshold": {"signal": "threshold"}
        });
        let descriptor = QueryDescriptor::from_value(&value).unwrap();
        assert_eq!(descriptor.handle, "ibis-1");
        assert_eq!(descriptor.bindings.len(), 1);
        assert_eq!(descriptor.to_value().unwrap(), value);
        assert!(QueryDescriptor::from_value(&json!({"type": "filter"})).is_none());
    }
}
