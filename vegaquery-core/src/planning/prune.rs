use crate::error::Result;
use crate::spec::chart::ChartSpec;
use crate::spec::transform::QUERY_TRANSFORM_TYPE;
use itertools::Itertools;
use serde_json::Value;
use std::collections::HashSet;

/// Remove data blocks that nothing else in the spec refers to, repeating until no block is
/// removed. A block is referenced when some string outside of its own `name` equals its name,
/// or quotes it as in `data("name")`. The `handle` of a query descriptor is not a reference.
pub fn prune_unreferenced(spec: &ChartSpec) -> Result<ChartSpec> {
    let mut spec = spec.clone();
    loop {
        let mut strings: Vec<String> = Vec::new();
        for (key, value) in &spec.extra {
            if key != "data" {
                collect_strings(value, &mut strings);
            }
        }
        for block in &spec.data {
            let mut value = serde_json::to_value(block)?;
            if let Value::Object(obj) = &mut value {
                obj.remove("name");
            }
            collect_strings(&value, &mut strings);
        }

        let unreferenced: HashSet<String> = spec
            .data
            .iter()
            .filter(|block| !is_referenced(&block.name, &strings))
            .map(|block| block.name.clone())
            .collect();

        if unreferenced.is_empty() {
            return Ok(spec);
        }
        log::debug!(
            "Pruning unreferenced data blocks: {}",
            unreferenced.iter().sorted().join(", ")
        );
        spec.data.retain(|block| !unreferenced.contains(&block.name));
    }
}

fn is_referenced(name: &str, strings: &[String]) -> bool {
    let double_quoted = format!("\"{name}\"");
    let single_quoted = format!("'{name}'");
    strings
        .iter()
        .any(|s| s == name || s.contains(&double_quoted) || s.contains(&single_quoted))
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(values) => {
            for v in values {
                collect_strings(v, out);
            }
        }
        Value::Object(obj) => {
            let is_descriptor =
                obj.get("type").and_then(Value::as_str) == Some(QUERY_TRANSFORM_TYPE);
            for (key, v) in obj {
                if is_descriptor && key == "handle" {
                    continue;
                }
                collect_strings(v, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prune(spec: Value) -> Value {
        prune_unreferenced(&ChartSpec::from_value(&spec).unwrap())
            .unwrap()
            .to_value()
            .unwrap()
    }

    fn names(spec: &Value) -> Vec<&str> {
        spec["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_prunes_transitively() {
        let result = prune(json!({
            "data": [
                {"name": "a", "values": []},
                {"name": "b", "source": "a"},
                {"name": "c", "values": []},
                {"name": "d", "source": "c"}
            ],
            "marks": [{"type": "rect", "from": {"data": "b"}}]
        }));
        assert_eq!(names(&result), vec!["a", "b"]);
    }

    #[test]
    fn test_expression_references_count() {
        let result = prune(json!({
            "signals": [{"name": "n", "update": "length(data('store'))"}],
            "data": [
                {"name": "store"},
                {"name": "other"}
            ]
        }));
        assert_eq!(names(&result), vec!["store"]);
    }

    #[test]
    fn test_descriptor_handle_is_not_a_reference() {
        let result = prune(json!({
            "data": [
                {"name": "ibis-1", "transform": [
                    {"type": "queryibis", "handle": "ibis-1", "transform": []}
                ]},
                {"name": "data_0", "transform": [
                    {"type": "queryibis", "handle": "ibis-1", "transform": []}
                ]}
            ],
            "marks": [{"from": {"data": "data_0"}}]
        }));
        assert_eq!(names(&result), vec!["data_0"]);
    }

    #[test]
    fn test_pruning_is_idempotent() {
        let spec = json!({
            "data": [
                {"name": "a", "values": []},
                {"name": "b", "source": "a"},
                {"name": "unused", "values": []}
            ],
            "scales": [{"name": "x", "domain": {"data": "b", "field": "v"}}]
        });
        let once = prune(spec);
        let twice = prune(once.clone());
        assert_eq!(once, twice);
        assert_eq!(names(&once), vec!["a", "b"]);
    }
}
