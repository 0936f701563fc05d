use crate::expression::compiler::compile;
use crate::expression::compiler::config::CompilationConfig;
use datafusion_common::DFSchema;
use datafusion_expr::{when, Expr};
use vegaquery_common::arrow::datatypes::DataType;
use vegaquery_common::datatypes::{cast_to, to_boolean, to_numeric};
use vegaquery_common::error::Result;
use vegaquery_core::expression::ast::{BinaryOperator, Expression, LogicalOperator, UnaryOperator};

pub fn compile_unary(
    op: &UnaryOperator,
    argument: &Expression,
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    let argument = compile(argument, config, schema)?;
    Ok(match op {
        UnaryOperator::Not => !to_boolean(argument, schema)?,
        UnaryOperator::Neg => -to_numeric(argument, schema)?,
        UnaryOperator::Pos => to_numeric(argument, schema)?,
    })
}

pub fn compile_binary(
    op: &BinaryOperator,
    left: &Expression,
    right: &Expression,
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    let lhs = compile(left, config, schema)?;
    let rhs = compile(right, config, schema)?;
    Ok(match op {
        BinaryOperator::Plus => to_numeric(lhs, schema)? + to_numeric(rhs, schema)?,
        BinaryOperator::Minus => to_numeric(lhs, schema)? - to_numeric(rhs, schema)?,
        BinaryOperator::Mult => to_numeric(lhs, schema)? * to_numeric(rhs, schema)?,
        // Vega division is always floating point
        BinaryOperator::Div => {
            cast_to(lhs, &DataType::Float64, schema)? / cast_to(rhs, &DataType::Float64, schema)?
        }
        BinaryOperator::Mod => to_numeric(lhs, schema)? % to_numeric(rhs, schema)?,
        BinaryOperator::GreaterThan => lhs.gt(rhs),
        BinaryOperator::GreaterThanEqual => lhs.gt_eq(rhs),
        BinaryOperator::LessThan => lhs.lt(rhs),
        BinaryOperator::LessThanEqual => lhs.lt_eq(rhs),
        BinaryOperator::Equals | BinaryOperator::StrictEquals => lhs.eq(rhs),
        BinaryOperator::NotEquals | BinaryOperator::NotStrictEquals => lhs.not_eq(rhs),
    })
}

pub fn compile_logical(
    op: &LogicalOperator,
    left: &Expression,
    right: &Expression,
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    let lhs = to_boolean(compile(left, config, schema)?, schema)?;
    let rhs = to_boolean(compile(right, config, schema)?, schema)?;
    Ok(match op {
        LogicalOperator::And => lhs.and(rhs),
        LogicalOperator::Or => lhs.or(rhs),
    })
}

pub fn compile_conditional(
    test: &Expression,
    consequent: &Expression,
    alternate: &Expression,
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    let test = to_boolean(compile(test, config, schema)?, schema)?;
    let consequent = compile(consequent, config, schema)?;
    let alternate = compile(alternate, config, schema)?;
    Ok(when(test, consequent).otherwise(alternate)?)
}

#[cfg(test)]
mod tests {
    use crate::expression::compiler::compile_str;
    use crate::expression::compiler::config::CompilationConfig;
    use datafusion_common::DFSchema;
    use datafusion_expr::{col, lit};
    use vegaquery_common::arrow::datatypes::{DataType, Field, Schema};

    fn schema() -> DFSchema {
        DFSchema::try_from(Schema::new(vec![
            Field::new("b", DataType::Int64, true),
            Field::new("flag", DataType::Boolean, true),
        ]))
        .unwrap()
    }

    #[test]
    fn test_range_conjunction() {
        let expr = compile_str(
            "datum.b >= 0 && datum.b <= 10",
            &CompilationConfig::default(),
            &schema(),
        )
        .unwrap();
        let expected = col("b")
            .gt_eq(lit(0i64))
            .is_true()
            .and(col("b").lt_eq(lit(10i64)).is_true());
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_arithmetic_and_not() {
        let config = CompilationConfig::default();
        assert_eq!(
            compile_str("datum.b * 2", &config, &schema()).unwrap(),
            col("b") * lit(2i64)
        );
        assert_eq!(
            compile_str("!datum.flag", &config, &schema()).unwrap(),
            !col("flag").is_true()
        );
    }

    #[test]
    fn test_conditional() {
        let expr = compile_str(
            "datum.flag ? datum.b : 0",
            &CompilationConfig::default(),
            &schema(),
        );
        assert!(expr.is_ok());
    }
}
