use crate::expression::compiler::config::CompilationConfig;
use datafusion_common::DFSchema;
use datafusion_expr::Expr;
use vegaquery_common::column::flat_col;
use vegaquery_common::error::{Result, VegaQueryError};
use vegaquery_core::expression::ast::Expression;

/// Compile `datum.field` and `datum["field"]` into column references. Members of constant
/// objects are folded before this point.
pub fn compile_member(
    expr: &Expression,
    _config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    let Some(field) = expr.as_datum_field() else {
        return Err(VegaQueryError::compilation(format!(
            "Unsupported member expression: {expr}"
        )));
    };
    if schema.field_with_unqualified_name(&field).is_ok() {
        Ok(flat_col(&field))
    } else {
        Err(VegaQueryError::compilation(format!(
            "No field named {field} in input"
        )))
    }
}
