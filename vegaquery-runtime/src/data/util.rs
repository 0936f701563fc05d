use async_trait::async_trait;
use datafusion::prelude::{DataFrame, SessionContext};
use vegaquery_common::data::table::VegaQueryTable;
use vegaquery_common::datafusion_expr::LogicalPlan;
use vegaquery_common::error::{Result, ResultWithContext};

#[async_trait]
pub trait SessionContextUtils {
    /// Register `table` under `name` suffixed with a fingerprint of its contents, and return a
    /// plan that scans it. Tables registered under one name with different rows get distinct
    /// scans, so plans built over earlier rows keep reading them.
    async fn register_query_table(&self, name: &str, table: VegaQueryTable) -> Result<LogicalPlan>;
}

#[async_trait]
impl SessionContextUtils for SessionContext {
    async fn register_query_table(&self, name: &str, table: VegaQueryTable) -> Result<LogicalPlan> {
        let table_name = format!("{name}_{:016x}", table.get_hash()?);
        let batch = table.to_record_batch()?;
        self.deregister_table(table_name.as_str())?;
        self.register_batch(&table_name, batch)
            .with_context(|| format!("Failed to register table {name}"))?;
        Ok(self.table(table_name.as_str()).await?.into_unoptimized_plan())
    }
}

#[async_trait]
pub trait DataFrameUtils {
    async fn collect_to_table(self) -> Result<VegaQueryTable>;
}

#[async_trait]
impl DataFrameUtils for DataFrame {
    async fn collect_to_table(self) -> Result<VegaQueryTable> {
        let schema = self.schema().inner().clone();
        let batches = self.collect().await?;
        VegaQueryTable::try_new(schema, batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datafusion::context::make_datafusion_context;
    use serde_json::{json, Value};

    async fn collect(ctx: &SessionContext, plan: LogicalPlan) -> Value {
        DataFrame::new(ctx.state(), plan)
            .collect_to_table()
            .await
            .unwrap()
            .to_json()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reregistered_name_keeps_earlier_scans() {
        let ctx = make_datafusion_context().unwrap();
        let first = VegaQueryTable::from_json(&json!([{"a": 1}])).unwrap();
        let second = VegaQueryTable::from_json(&json!([{"a": 7}, {"a": 8}])).unwrap();

        let first_plan = ctx.register_query_table("t", first).await.unwrap();
        let second_plan = ctx.register_query_table("t", second).await.unwrap();

        assert_ne!(first_plan, second_plan);
        assert_eq!(collect(&ctx, first_plan).await, json!([{"a": 1}]));
        assert_eq!(collect(&ctx, second_plan).await, json!([{"a": 7}, {"a": 8}]));
    }

    #[tokio::test]
    async fn test_same_rows_register_twice() {
        let ctx = make_datafusion_context().unwrap();
        let rows = json!([{"a": 1}, {"a": 2}]);
        let first = ctx
            .register_query_table("t", VegaQueryTable::from_json(&rows).unwrap())
            .await
            .unwrap();
        let again = ctx
            .register_query_table("t", VegaQueryTable::from_json(&rows).unwrap())
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(collect(&ctx, again).await, rows);
    }
}
