use crate::expression::compiler::config::CompilationConfig;
use crate::transform::pipeline::apply_transforms;
use datafusion::prelude::{DataFrame, SessionContext};
use serde_json::{Map, Value};
use std::sync::Arc;
use vegaquery_common::data::table::VegaQueryTable;
use vegaquery_common::datafusion_expr::LogicalPlan;
use vegaquery_common::error::{Result, ResultWithContext};
use vegaquery_core::expression::substitute::substitute_data_references;
use vegaquery_core::protocol::QueryRequest;
use vegaquery_core::runtime::PlanExecutor;
use vegaquery_core::spec::transform::TransformSpec;

/// Applies the residual transforms of a query request on top of a registered expression
#[derive(Clone)]
pub struct TransformExecutor {
    ctx: Arc<SessionContext>,
    plan_executor: Arc<dyn PlanExecutor>,
}

impl TransformExecutor {
    pub fn new(ctx: Arc<SessionContext>, plan_executor: Arc<dyn PlanExecutor>) -> Self {
        Self { ctx, plan_executor }
    }

    /// Build the plan that answers `request` when run against `base`
    pub fn plan_query(&self, base: &LogicalPlan, request: &QueryRequest) -> Result<LogicalPlan> {
        let transforms = request
            .transform
            .iter()
            .map(|tx| substitute_strings(tx, &request.bindings))
            .collect::<Result<Vec<_>>>()?;
        let transforms = TransformSpec::from_values(&transforms)?;
        let config = CompilationConfig::from_bindings(&request.bindings);

        let dataframe = DataFrame::new(self.ctx.state(), base.clone());
        let dataframe = apply_transforms(dataframe, &transforms, &config)
            .with_context(|| format!("Failed to plan query on {}", request.handle))?;
        Ok(dataframe.into_unoptimized_plan())
    }

    pub async fn execute(&self, base: &LogicalPlan, request: &QueryRequest) -> Result<VegaQueryTable> {
        let plan = self.plan_query(base, request)?;
        let table = self.plan_executor.execute_plan(plan).await?;
        log::info!(
            "Executed query on {} with {} transforms: {} rows",
            request.handle,
            request.transform.len(),
            table.num_rows()
        );
        Ok(table)
    }
}

/// Replace bound data references in every string of a transform
fn substitute_strings(value: &Value, bindings: &Map<String, Value>) -> Result<Value> {
    Ok(match value {
        Value::String(s) => Value::String(substitute_data_references(s, bindings)?),
        Value::Array(values) => Value::Array(
            values
                .iter()
                .map(|v| substitute_strings(v, bindings))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| Ok((k.clone(), substitute_strings(v, bindings)?)))
                .collect::<Result<Map<_, _>>>()?,
        ),
        other => other.clone(),
    })
}
