use datafusion_common::DFSchema;
use datafusion_expr::Expr;
use datafusion_functions::math::expr_fn::{abs, ceil, exp, floor, isnan, ln, round, sqrt};
use vegaquery_common::arrow::datatypes::DataType;
use vegaquery_common::datatypes::{cast_to, to_numeric};
use vegaquery_common::error::Result;

/// Single argument math function by its Vega name
pub fn math_function(name: &str, arg: Expr, schema: &DFSchema) -> Result<Option<Expr>> {
    let expr = match name {
        "abs" => abs(to_numeric(arg, schema)?),
        "ceil" => ceil(to_numeric(arg, schema)?),
        "floor" => floor(to_numeric(arg, schema)?),
        "round" => round(vec![to_numeric(arg, schema)?]),
        "sqrt" => sqrt(cast_to(arg, &DataType::Float64, schema)?),
        "exp" => exp(cast_to(arg, &DataType::Float64, schema)?),
        "log" => ln(cast_to(arg, &DataType::Float64, schema)?),
        "isNaN" => isnan(cast_to(arg, &DataType::Float64, schema)?),
        _ => return Ok(None),
    };
    Ok(Some(expr))
}
