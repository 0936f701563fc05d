use crate::error::{Result, ToExternalError};
use regex::{NoExpand, Regex};
use serde_json::{Map, Value};

/// Replace `data("<name>")` and the store argument of `vlSelectionTest("<name>", ...)` with the
/// JSON literal of the value bound to `<name>`. Names without a binding are left untouched.
pub fn substitute_data_references(expr: &str, bindings: &Map<String, Value>) -> Result<String> {
    let mut result = expr.to_string();
    for (name, value) in bindings {
        if !result.contains(name.as_str()) {
            continue;
        }
        let quoted = format!(r#"["']{}["']"#, regex::escape(name));
        let literal = serde_json::to_string(value)?;

        let data_re = Regex::new(&format!(r"\bdata\(\s*{quoted}\s*\)"))
            .external("Failed to build data reference pattern")?;
        result = data_re
            .replace_all(&result, NoExpand(&literal))
            .into_owned();

        let selection_re = Regex::new(&format!(r"\bvlSelectionTest\(\s*{quoted}"))
            .external("Failed to build selection reference pattern")?;
        let replacement = format!("vlSelectionTest({literal}");
        result = selection_re
            .replace_all(&result, NoExpand(&replacement))
            .into_owned();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::parse;
    use serde_json::json;

    fn bindings(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_substitutes_data_and_selection_store() {
        let store = json!([{"unit": "", "fields": [{"field": "a", "type": "E"}], "values": ["x"]}]);
        let result = substitute_data_references(
            r#"!length(data("brush_store")) || vlSelectionTest('brush_store', datum)"#,
            &bindings(json!({ "brush_store": store })),
        )
        .unwrap();

        let literal = serde_json::to_string(&store).unwrap();
        assert_eq!(
            result,
            format!("!length({literal}) || vlSelectionTest({literal}, datum)")
        );
        // Substituted text still parses
        parse(&result).unwrap();
    }

    #[test]
    fn test_leaves_unbound_and_similar_names() {
        let src = r#"indata("brush_store", "a", datum.a) || data("brush_store_2")"#;
        let result =
            substitute_data_references(src, &bindings(json!({"brush_store": []}))).unwrap();
        assert_eq!(result, src);
    }
}
