use crate::data::table::VegaQueryTable;
use crate::datafusion_expr::LogicalPlan;
use crate::error::{Result, VegaQueryError};
use async_trait::async_trait;

#[async_trait]
pub trait PlanExecutor: Send + Sync {
    async fn execute_plan(&self, plan: LogicalPlan) -> Result<VegaQueryTable>;
}

/// Executor for sessions that only hand query descriptors to the frontend and never run plans
#[derive(Debug, Clone, Default)]
pub struct NoOpPlanExecutor;

#[async_trait]
impl PlanExecutor for NoOpPlanExecutor {
    async fn execute_plan(&self, _plan: LogicalPlan) -> Result<VegaQueryTable> {
        Err(VegaQueryError::internal(
            "NoOpPlanExecutor cannot execute logical plans",
        ))
    }
}
