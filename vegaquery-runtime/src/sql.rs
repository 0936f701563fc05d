use datafusion_sql::unparser::plan_to_sql;
use vegaquery_common::datafusion_expr::LogicalPlan;
use vegaquery_common::error::{Result, ResultWithContext};

/// SQL text that a database would run for `plan`
pub fn plan_to_sql_string(plan: &LogicalPlan) -> Result<String> {
    let statement =
        plan_to_sql(plan).with_context(|| "Failed to render query plan as SQL".to_string())?;
    Ok(statement.to_string())
}
