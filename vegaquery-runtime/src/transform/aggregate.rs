use crate::transform::{TransformContext, TransformTrait};
use datafusion::prelude::DataFrame;
use datafusion_common::DFSchema;
use datafusion_expr::{lit, when, Expr};
use datafusion_functions_aggregate::expr_fn::{
    avg, count, count_distinct, max, median, min, stddev, stddev_pop, sum, var_pop, var_sample,
};
use itertools::Itertools;
use vegaquery_common::column::flat_col;
use vegaquery_common::datatypes::to_numeric;
use vegaquery_common::error::{Result, VegaQueryError};
use vegaquery_core::spec::transform::aggregate::{
    AggregateOpSpec, AggregateSpec, AggregateTransformSpec,
};

impl TransformTrait for AggregateTransformSpec {
    fn apply(&self, dataframe: DataFrame, context: &mut TransformContext) -> Result<DataFrame> {
        let groupby: Vec<String> = context
            .pending_groupby
            .take()
            .unwrap_or_default()
            .into_iter()
            .chain(self.groupby.iter().cloned())
            .unique()
            .collect();

        let schema = dataframe.schema().clone();
        let group_exprs = groupby
            .iter()
            .map(|field| field_col(field, &schema))
            .collect::<Result<Vec<_>>>()?;
        let mut agg_exprs = Vec::new();
        let mut output_exprs: Vec<Expr> = groupby.iter().map(|field| flat_col(field)).collect();
        for agg in &self.aggregates {
            let (aggregates, output) = make_agg_expr(agg, &schema)?;
            agg_exprs.extend(aggregates);
            output_exprs.push(output);
        }

        Ok(dataframe
            .aggregate(group_exprs, agg_exprs)?
            .select(output_exprs)?)
    }
}

/// Grouped distinct keys, used when a groupby is never consumed by an aggregate
pub fn distinct_groups(dataframe: DataFrame, groupby: &[String]) -> Result<DataFrame> {
    let schema = dataframe.schema().clone();
    let group_exprs = groupby
        .iter()
        .map(|field| field_col(field, &schema))
        .collect::<Result<Vec<_>>>()?;
    Ok(dataframe.aggregate(group_exprs, Vec::new())?)
}

fn field_col(field: &str, schema: &DFSchema) -> Result<Expr> {
    if schema.field_with_unqualified_name(field).is_ok() {
        Ok(flat_col(field))
    } else {
        Err(VegaQueryError::translation(format!(
            "No field named {field} to aggregate over"
        )))
    }
}

/// Aggregate expressions for `agg`, and the expression that reads its output column back out
/// of the aggregated frame
fn make_agg_expr(agg: &AggregateSpec, schema: &DFSchema) -> Result<(Vec<Expr>, Expr)> {
    let name = agg.output_name();
    let op = agg.op.canonical();
    let column = match (&agg.field, op) {
        // Vega ignores the field for count
        (_, AggregateOpSpec::Count) => None,
        (Some(field), _) => Some(field_col(field, schema)?),
        (None, _) => None,
    };

    let expr = match (op, column) {
        (AggregateOpSpec::Count, _) => count(lit(1i64)),
        (AggregateOpSpec::Valid, Some(column)) => count(column),
        (AggregateOpSpec::Missing, Some(column)) => {
            sum(when(column.is_null(), lit(1i64)).otherwise(lit(0i64))?)
        }
        (AggregateOpSpec::Distinct, Some(column)) => {
            // Null counts as one more distinct value
            let values_name = format!("{name}__values");
            let nulls_name = format!("{name}__null");
            let aggregates = vec![
                count_distinct(column.clone()).alias(&values_name),
                max(when(column.is_null(), lit(1i64)).otherwise(lit(0i64))?).alias(&nulls_name),
            ];
            let output = (flat_col(&values_name) + flat_col(&nulls_name)).alias(&name);
            return Ok((aggregates, output));
        }
        (AggregateOpSpec::Sum, Some(column)) => sum(to_numeric(column, schema)?),
        (AggregateOpSpec::Mean | AggregateOpSpec::Average, Some(column)) => {
            avg(to_numeric(column, schema)?)
        }
        (AggregateOpSpec::Median, Some(column)) => median(to_numeric(column, schema)?),
        (AggregateOpSpec::Min, Some(column)) => min(column),
        (AggregateOpSpec::Max, Some(column)) => max(column),
        (AggregateOpSpec::Variance, Some(column)) => var_sample(to_numeric(column, schema)?),
        (AggregateOpSpec::Variancep, Some(column)) => var_pop(to_numeric(column, schema)?),
        (AggregateOpSpec::Stdev, Some(column)) => stddev(to_numeric(column, schema)?),
        (AggregateOpSpec::Stdevp, Some(column)) => stddev_pop(to_numeric(column, schema)?),
        (op, None) => {
            return Err(VegaQueryError::translation(format!(
                "Aggregate op {op} requires a field"
            )))
        }
    };
    Ok((vec![expr.alias(&name)], flat_col(&name)))
}
