pub mod binary;
pub mod builtin_functions;
pub mod call;
pub mod config;
pub mod constant;
pub mod member;

use crate::expression::compiler::binary::{
    compile_binary, compile_conditional, compile_logical, compile_unary,
};
use crate::expression::compiler::call::compile_call;
use crate::expression::compiler::config::CompilationConfig;
use crate::expression::compiler::constant::{constant_value, json_to_lit};
use crate::expression::compiler::member::compile_member;
use datafusion_common::DFSchema;
use datafusion_expr::Expr;
use vegaquery_common::error::{Result, VegaQueryError};
use vegaquery_core::expression::ast::Expression;
use vegaquery_core::expression::parser::parse;

/// Compile a Vega expression into a DataFusion expression over rows of `schema`
pub fn compile(expr: &Expression, config: &CompilationConfig, schema: &DFSchema) -> Result<Expr> {
    if let Some(value) = constant_value(expr, config) {
        return json_to_lit(&value)
            .map_err(|err| err.with_context(|| format!("Failed to compile {expr}")));
    }
    match expr {
        Expression::Identifier(name) => Err(VegaQueryError::compilation(format!(
            "No signal named {name} in evaluation scope"
        ))),
        Expression::Member { .. } => compile_member(expr, config, schema),
        Expression::Unary { op, argument } => compile_unary(op, argument, config, schema),
        Expression::Binary { op, left, right } => compile_binary(op, left, right, config, schema),
        Expression::Logical { op, left, right } => {
            compile_logical(op, left, right, config, schema)
        }
        Expression::Conditional {
            test,
            consequent,
            alternate,
        } => compile_conditional(test, consequent, alternate, config, schema),
        Expression::Call { callee, arguments } => compile_call(callee, arguments, config, schema),
        Expression::Literal(_) | Expression::Array(_) | Expression::Object(_) => {
            Err(VegaQueryError::compilation(format!(
                "Array and object expressions are only supported as constants: {expr}"
            )))
        }
    }
}

/// Parse and compile an expression string
pub fn compile_str(expr: &str, config: &CompilationConfig, schema: &DFSchema) -> Result<Expr> {
    let parsed = parse(expr)?;
    compile(&parsed, config, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion_common::ScalarValue;
    use datafusion_expr::{col, lit};
    use serde_json::json;
    use vegaquery_common::arrow::datatypes::{DataType, Field, Schema};

    pub(crate) fn schema() -> DFSchema {
        DFSchema::try_from(Schema::new(vec![
            Field::new("a", DataType::Utf8, true),
            Field::new("b", DataType::Int64, true),
            Field::new("c", DataType::Float64, true),
        ]))
        .unwrap()
    }

    fn config() -> CompilationConfig {
        CompilationConfig::from_bindings(
            json!({"threshold": 3, "brush": {"x": [1, 2]}})
                .as_object()
                .unwrap(),
        )
    }

    #[test]
    fn test_signal_and_constant_literals() {
        assert_eq!(
            compile_str("threshold", &config(), &schema()).unwrap(),
            lit(3i64)
        );
        assert_eq!(
            compile_str("brush.x[1]", &config(), &schema()).unwrap(),
            lit(2i64)
        );
        assert_eq!(
            compile_str("null", &config(), &schema()).unwrap(),
            lit(ScalarValue::Null)
        );
    }

    #[test]
    fn test_datum_comparison() {
        assert_eq!(
            compile_str("datum.b > threshold", &config(), &schema()).unwrap(),
            col("b").gt(lit(3i64))
        );
    }

    #[test]
    fn test_unknown_signal_is_compilation_error() {
        let err = compile_str("datum.b > missing", &config(), &schema()).unwrap_err();
        assert!(matches!(err, VegaQueryError::CompilationError(..)));
    }

    #[test]
    fn test_unknown_column_is_compilation_error() {
        let err = compile_str("datum.zzz", &config(), &schema()).unwrap_err();
        assert!(matches!(err, VegaQueryError::CompilationError(..)));
    }

    #[test]
    fn test_non_scalar_constant_is_error() {
        assert!(compile_str("brush", &config(), &schema()).is_err());
    }
}
