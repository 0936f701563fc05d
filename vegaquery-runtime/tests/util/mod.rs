use serde_json::{Map, Value};
use std::sync::Arc;
use vegaquery_common::data::table::VegaQueryTable;
use vegaquery_common::error::Result;
use vegaquery_core::protocol::QueryRequest;
use vegaquery_runtime::data::util::SessionContextUtils;
use vegaquery_runtime::datafusion::context::make_datafusion_context;
use vegaquery_runtime::executor::TransformExecutor;
use vegaquery_runtime::plan_executor::DataFusionPlanExecutor;

/// Run `transforms` over `rows` and return the result rows, sorted by `sort_key`
pub async fn eval_transforms(
    rows: &Value,
    transforms: Vec<Value>,
    bindings: Value,
    sort_key: &str,
) -> Result<Vec<Value>> {
    let ctx = Arc::new(make_datafusion_context()?);
    let executor = TransformExecutor::new(
        ctx.clone(),
        Arc::new(DataFusionPlanExecutor::new(ctx.clone())),
    );
    let base = ctx
        .register_query_table("source", VegaQueryTable::from_json(rows)?)
        .await?;

    let request = QueryRequest {
        handle: "ibis-test".to_string(),
        transform: transforms,
        bindings: bindings.as_object().cloned().unwrap_or_else(Map::new),
    };
    let mut result = executor.execute(&base, &request).await?.to_json_rows()?;
    result.sort_by(|a, b| {
        a[sort_key]
            .as_f64()
            .partial_cmp(&b[sort_key].as_f64())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(result)
}
