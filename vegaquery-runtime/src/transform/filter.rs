use crate::expression::compiler::compile_str;
use crate::expression::compiler::config::CompilationConfig;
use crate::expression::compiler::constant::json_to_lit;
use crate::transform::{TransformContext, TransformTrait};
use datafusion::prelude::DataFrame;
use datafusion_common::DFSchema;
use datafusion_expr::{in_list, lit, Expr};
use vegaquery_common::column::flat_col;
use vegaquery_common::datatypes::to_boolean;
use vegaquery_common::error::{Result, ResultWithContext, VegaQueryError};
use vegaquery_core::spec::transform::filter::{
    FieldPredicateOp, FieldPredicateSpec, FilterTransformSpec, PredicateSpec,
};

impl TransformTrait for FilterTransformSpec {
    fn apply(&self, dataframe: DataFrame, context: &mut TransformContext) -> Result<DataFrame> {
        if let Some(op) = unrecognized_op(&self.predicate) {
            log::warn!("Skipping filter with unrecognized operator {op:?}");
            return Ok(dataframe);
        }
        let predicate = compile_predicate(&self.predicate, &context.config, dataframe.schema())
            .with_context(|| "Failed to translate filter predicate".to_string())?;
        Ok(dataframe.filter(predicate)?)
    }
}

/// First field operator in `predicate` that has no translation
fn unrecognized_op(predicate: &PredicateSpec) -> Option<&str> {
    match predicate {
        PredicateSpec::Expr(_) => None,
        PredicateSpec::Field(FieldPredicateSpec {
            op: FieldPredicateOp::Unrecognized(op),
            ..
        }) => Some(op.as_str()),
        PredicateSpec::Field(_) => None,
        PredicateSpec::And(operands) | PredicateSpec::Or(operands) => {
            operands.iter().find_map(unrecognized_op)
        }
        PredicateSpec::Not(operand) => unrecognized_op(operand),
    }
}

pub fn compile_predicate(
    predicate: &PredicateSpec,
    config: &CompilationConfig,
    schema: &DFSchema,
) -> Result<Expr> {
    Ok(match predicate {
        PredicateSpec::Expr(expr) => to_boolean(compile_str(expr, config, schema)?, schema)?,
        PredicateSpec::Field(field) => compile_field_predicate(field, schema)?,
        PredicateSpec::And(operands) => operands
            .iter()
            .map(|p| compile_predicate(p, config, schema))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .reduce(|a, b| a.and(b))
            .unwrap_or(lit(true)),
        PredicateSpec::Or(operands) => operands
            .iter()
            .map(|p| compile_predicate(p, config, schema))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .reduce(|a, b| a.or(b))
            .unwrap_or(lit(false)),
        PredicateSpec::Not(operand) => !compile_predicate(operand, config, schema)?.is_true(),
    })
}

fn compile_field_predicate(predicate: &FieldPredicateSpec, schema: &DFSchema) -> Result<Expr> {
    if schema.field_with_unqualified_name(&predicate.field).is_err() {
        return Err(VegaQueryError::translation(format!(
            "No field named {} to filter on",
            predicate.field
        )));
    }
    let column = flat_col(&predicate.field);
    Ok(match &predicate.op {
        FieldPredicateOp::Range(low, high) => {
            let low = low
                .as_ref()
                .map(|v| json_to_lit(v).map(|v| column.clone().gt_eq(v)))
                .transpose()?;
            let high = high
                .as_ref()
                .map(|v| json_to_lit(v).map(|v| column.clone().lt_eq(v)))
                .transpose()?;
            match (low, high) {
                (Some(low), Some(high)) => low.and(high),
                (Some(bound), None) | (None, Some(bound)) => bound,
                (None, None) => column.is_not_null(),
            }
        }
        FieldPredicateOp::Equal(v) => column.eq(json_to_lit(v)?),
        FieldPredicateOp::Lt(v) => column.lt(json_to_lit(v)?),
        FieldPredicateOp::Lte(v) => column.lt_eq(json_to_lit(v)?),
        FieldPredicateOp::Gt(v) => column.gt(json_to_lit(v)?),
        FieldPredicateOp::Gte(v) => column.gt_eq(json_to_lit(v)?),
        FieldPredicateOp::OneOf(values) => in_list(
            column,
            values.iter().map(json_to_lit).collect::<Result<Vec<_>>>()?,
            false,
        ),
        FieldPredicateOp::Valid(true) => column.is_not_null(),
        FieldPredicateOp::Valid(false) => column.is_null(),
        FieldPredicateOp::Unrecognized(op) => {
            return Err(VegaQueryError::translation(format!(
                "Unrecognized filter operator {op:?} on field {}",
                predicate.field
            )))
        }
    })
}
