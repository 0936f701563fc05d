use crate::comm::{CommChannel, CommClient, PendingReply};
use crate::data::util::SessionContextUtils;
use crate::datafusion::context::make_datafusion_context;
use crate::executor::TransformExecutor;
use crate::plan_executor::DataFusionPlanExecutor;
use crate::sql::plan_to_sql_string;
use datafusion::prelude::SessionContext;
use serde_json::{json, Map, Value};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use uuid::Uuid;
use vegaquery_common::data::table::VegaQueryTable;
use vegaquery_common::datafusion_expr::LogicalPlan;
use vegaquery_common::error::{Result, ResultWithContext, VegaQueryError};
use vegaquery_core::adapter::ChartAdapter;
use vegaquery_core::mimebundle::{display_data, EMPTY_VEGA, VEGA_MIME_TYPE, VEGA_QUERY_MIME_TYPE};
use vegaquery_core::planning::rewrite::QueryDescriptor;
use vegaquery_core::planning::rewrite_spec;
use vegaquery_core::protocol::{CommMessage, QueryRequest};
use vegaquery_core::registry::{ExpressionRegistry, DEFAULT_NAME_PREFIX};
use vegaquery_core::spec::chart::ChartSpec;
use vegaquery_core::spec::data::DataSpec;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Prefix of every expression handle issued by the session
    pub name_prefix: String,

    /// How long to wait for the frontend to answer a compile request
    pub reply_timeout: Duration,

    /// Execute query descriptors at compile time and inline their rows as `values`
    pub inline_results: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            reply_timeout: Duration::from_secs(30),
            inline_results: false,
        }
    }
}

/// A render whose placeholder is on screen and whose compile request is in flight
pub struct PendingRender {
    display_id: String,
    reply: Result<PendingReply>,
}

impl PendingRender {
    pub fn display_id(&self) -> &str {
        &self.display_id
    }
}

/// Kernel side of one notebook session: owns the expression registry, renders charts through
/// the frontend compiler, and answers the query requests of rendered charts
pub struct ChartSession {
    config: SessionConfig,
    ctx: Arc<SessionContext>,
    registry: RwLock<ExpressionRegistry>,
    executor: TransformExecutor,
    comm: CommClient,
}

impl ChartSession {
    pub fn try_new(config: SessionConfig, channel: Arc<dyn CommChannel>) -> Result<Self> {
        let ctx = Arc::new(make_datafusion_context()?);
        let plan_executor = Arc::new(DataFusionPlanExecutor::new(ctx.clone()));
        Ok(Self {
            registry: RwLock::new(ExpressionRegistry::new(&config.name_prefix)),
            executor: TransformExecutor::new(ctx.clone(), plan_executor),
            comm: CommClient::new(channel, config.reply_timeout),
            ctx,
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn context(&self) -> Arc<SessionContext> {
        self.ctx.clone()
    }

    pub fn comm(&self) -> &CommClient {
        &self.comm
    }

    pub fn register_plan(&self, plan: LogicalPlan) -> Result<String> {
        self.registry_mut()?.register(plan)
    }

    /// Register `table` with the execution context and issue a handle for a scan of it
    pub async fn register_table(&self, name: &str, table: VegaQueryTable) -> Result<String> {
        let plan = self.ctx.register_query_table(name, table).await?;
        let handle = self.register_plan(plan)?;
        log::info!("Registered table {name} as {handle}");
        Ok(handle)
    }

    pub fn resolve(&self, handle: &str) -> Result<LogicalPlan> {
        Ok(self.registry()?.resolve(handle)?.clone())
    }

    pub fn evict(&self, handle: &str) -> Result<bool> {
        Ok(self.registry_mut()?.evict(handle).is_some())
    }

    pub fn handles(&self) -> Result<Vec<String>> {
        Ok(self.registry()?.handles())
    }

    /// Point a Vega-Lite spec at the expression behind `handle`
    pub fn bind_chart(&self, vegalite_spec: &Value, handle: &str) -> Result<Value> {
        let plan = self.resolve(handle)?;
        let schema = plan.schema().as_arrow().clone();
        ChartAdapter::bind(vegalite_spec, handle, &schema)
    }

    /// Show the placeholder chart and send the compile request for `vegalite_spec`.
    ///
    /// Returns once the request is on the wire. Fallback-class failures are kept in the
    /// pending render so that `finish_render` settles on the placeholder.
    pub async fn begin_render(&self, vegalite_spec: &Value, handle: &str) -> Result<PendingRender> {
        let display_id = Uuid::new_v4().to_string();
        self.comm
            .send(CommMessage::Display {
                display_id: display_id.clone(),
                data: placeholder_display()?,
            })
            .await?;

        let reply = match self.bind_chart(vegalite_spec, handle) {
            Ok(spec) => {
                self.comm
                    .send_request(|id| CommMessage::CompileRequest { id, spec })
                    .await
            }
            Err(err) => Err(err),
        };
        match reply {
            Err(err) if !err.is_fallback() => Err(err),
            reply => Ok(PendingRender { display_id, reply }),
        }
    }

    /// Await the compiled spec and replace the placeholder with the rewritten chart.
    /// Returns the display id.
    pub async fn finish_render(&self, pending: PendingRender) -> Result<String> {
        let PendingRender { display_id, reply } = pending;
        let result = match reply {
            Ok(reply) => self.complete_render(&display_id, reply).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => Ok(display_id),
            Err(err) if err.is_fallback() => {
                log::warn!("Rendering placeholder chart for display {display_id}: {err}");
                self.comm
                    .send(CommMessage::UpdateDisplay {
                        display_id: display_id.clone(),
                        data: placeholder_display()?,
                    })
                    .await?;
                Ok(display_id)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn render(&self, vegalite_spec: &Value, handle: &str) -> Result<String> {
        let pending = self.begin_render(vegalite_spec, handle).await?;
        self.finish_render(pending).await
    }

    async fn complete_render(&self, display_id: &str, reply: PendingReply) -> Result<()> {
        let compiled = match reply.wait().await? {
            CommMessage::CompileResponse { spec, .. } => spec,
            other => {
                return Err(VegaQueryError::protocol(format!(
                    "Expected a compile response, received {}",
                    other.to_json()?
                )))
            }
        };
        match self.compile_spec(&compiled).await? {
            Some(data) => {
                self.comm
                    .send(CommMessage::UpdateDisplay {
                        display_id: display_id.to_string(),
                        data,
                    })
                    .await
            }
            None => Ok(()),
        }
    }

    /// Rewrite a compiled Vega spec and wrap it as display data. Specs without `$schema` have
    /// not been compiled yet and produce nothing.
    pub async fn compile_spec(&self, compiled: &Value) -> Result<Option<Value>> {
        if compiled.get("$schema").is_none() {
            log::debug!("Ignoring compiled spec without $schema");
            return Ok(None);
        }
        let chart = ChartSpec::from_value(compiled)?;
        let rewritten = {
            let registry = self.registry()?;
            rewrite_spec(&chart, &registry)?
        };

        let data = if self.config.inline_results {
            let inlined = self.inline_results(rewritten).await?;
            display_data(VEGA_MIME_TYPE, inlined.to_value()?)?
        } else {
            display_data(VEGA_QUERY_MIME_TYPE, rewritten.to_value()?)?
        };
        Ok(Some(data))
    }

    /// Execute every query descriptor of a rewritten spec and store its rows as `values`
    pub async fn inline_results(&self, mut spec: ChartSpec) -> Result<ChartSpec> {
        let signal_values = signal_values(&spec)?;
        for i in 0..spec.data.len() {
            let Some(request) = descriptor_request(&spec, &spec.data[i], &signal_values)? else {
                continue;
            };
            let rows = self
                .handle_query(&request)
                .await
                .with_context(|| format!("Failed to inline data {:?}", spec.data[i].name))?;
            let block = &mut spec.data[i];
            block.values = Some(rows);
            block.transform.clear();
        }
        Ok(spec)
    }

    /// SQL for the query behind each registry-backed data block of a compiled spec, in spec
    /// order
    pub fn extract_sql(&self, compiled: &Value) -> Result<Vec<(String, String)>> {
        let chart = ChartSpec::from_value(compiled)?;
        let rewritten = {
            let registry = self.registry()?;
            rewrite_spec(&chart, &registry)?
        };
        let signal_values = signal_values(&rewritten)?;

        let mut statements = Vec::new();
        for block in &rewritten.data {
            if let Some(request) = descriptor_request(&rewritten, block, &signal_values)? {
                statements.push((block.name.clone(), self.query_sql(&request)?));
            }
        }
        Ok(statements)
    }

    /// Rows produced by a query request
    pub async fn handle_query(&self, request: &QueryRequest) -> Result<Value> {
        let plan = self.resolve(&request.handle)?;
        let table = self.executor.execute(&plan, request).await?;
        table.to_json()
    }

    pub fn query_sql(&self, request: &QueryRequest) -> Result<String> {
        let plan = self.resolve(&request.handle)?;
        plan_to_sql_string(&self.executor.plan_query(&plan, request)?)
    }

    /// Route one inbound message. Replies wake their waiting request; query and SQL requests
    /// are answered on the channel, with failures reported as `error` messages.
    pub async fn handle_message(&self, message: CommMessage) -> Result<()> {
        match message {
            reply if reply.is_reply() => {
                self.comm.handle_reply(reply);
                Ok(())
            }
            CommMessage::QueryRequest { id, data } => {
                let reply = match self.handle_query(&data).await {
                    Ok(rows) => CommMessage::QueryResponse { id, rows },
                    Err(err) => error_reply(id, &data, err),
                };
                self.comm.send(reply).await
            }
            CommMessage::SqlRequest { id, data } => {
                let reply = match self.query_sql(&data) {
                    Ok(sql) => CommMessage::SqlResponse { id, sql },
                    Err(err) => error_reply(id, &data, err),
                };
                self.comm.send(reply).await
            }
            other => {
                log::warn!("Ignoring unexpected inbound message {}", other.to_json()?);
                Ok(())
            }
        }
    }

    /// Drop every registered expression and fail outstanding requests
    pub fn close(&self) -> Result<()> {
        self.registry_mut()?.clear();
        self.comm.cancel_all();
        Ok(())
    }

    fn registry(&self) -> Result<RwLockReadGuard<'_, ExpressionRegistry>> {
        self.registry.read().map_err(|err| {
            VegaQueryError::internal(format!("Failed to acquire registry lock: {err:?}"))
        })
    }

    fn registry_mut(&self) -> Result<RwLockWriteGuard<'_, ExpressionRegistry>> {
        self.registry.write().map_err(|err| {
            VegaQueryError::internal(format!("Failed to acquire registry lock: {err:?}"))
        })
    }
}

fn placeholder_display() -> Result<Value> {
    display_data(VEGA_QUERY_MIME_TYPE, EMPTY_VEGA.clone())
}

fn error_reply(id: String, request: &QueryRequest, err: VegaQueryError) -> CommMessage {
    log::warn!("Query on {} failed: {err}", request.handle);
    CommMessage::Error {
        id,
        message: err.to_string(),
    }
}

/// Initial values of the spec's top-level signals
fn signal_values(spec: &ChartSpec) -> Result<Map<String, Value>> {
    Ok(spec
        .signals()?
        .into_iter()
        .filter_map(|s| s.value.map(|v| (s.name, v)))
        .collect())
}

/// Query request for a data block carrying a query descriptor, with every binding resolved
/// from signal initial values and inline data values of the spec
fn descriptor_request(
    spec: &ChartSpec,
    block: &DataSpec,
    signal_values: &Map<String, Value>,
) -> Result<Option<QueryRequest>> {
    let [descriptor] = block.transform.as_slice() else {
        return Ok(None);
    };
    let Some(descriptor) = QueryDescriptor::from_value(descriptor) else {
        return Ok(None);
    };

    let mut bindings = Map::new();
    for (name, binding) in descriptor.bindings {
        let expr = binding
            .get("signal")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                VegaQueryError::translation(format!(
                    "Binding {name:?} of data {:?} is not a signal reference: {binding}",
                    block.name
                ))
            })?;
        let value = if expr == format!("data({})", Value::String(name.clone())) {
            spec.get_data(&name)
                .and_then(|d| d.values.clone())
                .unwrap_or_else(|| json!([]))
        } else {
            signal_values.get(expr).cloned().unwrap_or(Value::Null)
        };
        bindings.insert(name, value);
    }

    Ok(Some(QueryRequest {
        handle: descriptor.handle,
        transform: descriptor.transform,
        bindings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::tests::RecordingChannel;

    fn session(config: SessionConfig) -> (Arc<RecordingChannel>, ChartSession) {
        let channel = Arc::new(RecordingChannel::default());
        let session = ChartSession::try_new(config, channel.clone()).unwrap();
        (channel, session)
    }

    async fn cars(session: &ChartSession) -> String {
        let table = VegaQueryTable::from_json(&json!([
            {"a": 1, "b": 2.0},
            {"a": 1, "b": 4.0},
            {"a": 2, "b": 10.0}
        ]))
        .unwrap();
        session.register_table("cars", table).await.unwrap()
    }

    fn compiled(handle: &str) -> Value {
        json!({
            "$schema": "https://vega.github.io/schema/vega/v5.json",
            "signals": [{"name": "threshold", "value": 1}],
            "data": [
                {"name": handle},
                {"name": "data_0", "source": handle, "transform": [
                    {"type": "filter", "expr": "datum.a >= threshold"},
                    {"type": "aggregate", "groupby": ["a"], "ops": ["mean"], "fields": ["b"], "as": ["avg_b"]}
                ]}
            ],
            "marks": [{"type": "rect", "from": {"data": "data_0"}}]
        })
    }

    fn sorted_rows(rows: Value) -> Vec<Value> {
        let mut rows = rows.as_array().unwrap().clone();
        rows.sort_by_key(|r| r["a"].as_i64());
        rows
    }

    #[tokio::test]
    async fn test_render_replaces_placeholder_with_rewritten_spec() {
        let (channel, session) = session(SessionConfig::default());
        let handle = cars(&session).await;

        let pending = session
            .begin_render(&json!({"mark": "bar", "encoding": {"x": {"field": "a"}}}), &handle)
            .await
            .unwrap();
        let sent = channel.sent();
        assert!(matches!(&sent[0], CommMessage::Display { data, .. }
            if data["data"][VEGA_QUERY_MIME_TYPE] == *EMPTY_VEGA));
        let CommMessage::CompileRequest { id, spec } = &sent[1] else {
            panic!("expected compile request, found {:?}", sent[1])
        };
        assert_eq!(spec["data"], json!({"name": handle}));
        assert_eq!(spec["encoding"]["x"]["type"], json!("quantitative"));

        session
            .handle_message(CommMessage::CompileResponse {
                id: id.clone(),
                spec: compiled(&handle),
            })
            .await
            .unwrap();
        let display_id = session.finish_render(pending).await.unwrap();

        let sent = channel.sent();
        let CommMessage::UpdateDisplay { display_id: updated, data } = &sent[2] else {
            panic!("expected display update, found {:?}", sent[2])
        };
        assert_eq!(updated, &display_id);
        // The root block is pruned once its consumer no longer names it as a source
        let rewritten = &data["data"][VEGA_QUERY_MIME_TYPE];
        assert_eq!(rewritten["data"].as_array().unwrap().len(), 1);
        let descriptor = &rewritten["data"][0]["transform"][0];
        assert_eq!(descriptor["type"], json!("queryibis"));
        assert_eq!(descriptor["handle"], json!(handle));
        assert_eq!(descriptor["threshold"], json!({"signal": "threshold"}));
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_placeholder() {
        let (channel, session) = session(SessionConfig {
            reply_timeout: Duration::from_millis(10),
            ..Default::default()
        });
        let handle = cars(&session).await;

        session.render(&json!({"mark": "bar"}), &handle).await.unwrap();

        let sent = channel.sent();
        assert!(matches!(sent.last(), Some(CommMessage::UpdateDisplay { data, .. })
            if data["data"][VEGA_QUERY_MIME_TYPE] == *EMPTY_VEGA));
        assert_eq!(session.comm().num_pending(), 0);
    }

    #[tokio::test]
    async fn test_unknown_handle_renders_placeholder_without_compiling() {
        let (channel, session) = session(SessionConfig::default());
        session.render(&json!({"mark": "bar"}), "ibis-404").await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], CommMessage::Display { .. }));
        assert!(matches!(sent[1], CommMessage::UpdateDisplay { .. }));
    }

    #[tokio::test]
    async fn test_query_request_is_answered() {
        let (channel, session) = session(SessionConfig::default());
        let handle = cars(&session).await;

        session
            .handle_message(CommMessage::QueryRequest {
                id: "q1".to_string(),
                data: QueryRequest {
                    handle: handle.clone(),
                    transform: vec![
                        json!({"groupby": ["a"]}),
                        json!({"aggregate": [{"op": "mean", "field": "b", "as": "avg_b"}]}),
                    ],
                    bindings: Map::new(),
                },
            })
            .await
            .unwrap();

        let sent = channel.sent();
        let CommMessage::QueryResponse { id, rows } = &sent[0] else {
            panic!("expected query response, found {:?}", sent[0])
        };
        assert_eq!(id, "q1");
        assert_eq!(
            sorted_rows(rows.clone()),
            vec![json!({"a": 1, "avg_b": 3.0}), json!({"a": 2, "avg_b": 10.0})]
        );
    }

    #[tokio::test]
    async fn test_failed_query_is_error_reply() {
        let (channel, session) = session(SessionConfig::default());
        session
            .handle_message(CommMessage::QueryRequest {
                id: "q2".to_string(),
                data: QueryRequest {
                    handle: "ibis-404".to_string(),
                    transform: vec![],
                    bindings: Map::new(),
                },
            })
            .await
            .unwrap();

        let sent = channel.sent();
        assert!(matches!(&sent[0], CommMessage::Error { id, message }
            if id == "q2" && message.contains("ibis-404")));
    }

    #[tokio::test]
    async fn test_inline_results() {
        let (_, session) = session(SessionConfig {
            inline_results: true,
            ..Default::default()
        });
        let handle = cars(&session).await;

        let data = session.compile_spec(&compiled(&handle)).await.unwrap().unwrap();
        let spec = &data["data"][VEGA_MIME_TYPE];
        let block = &spec["data"][0];
        assert_eq!(block["name"], json!("data_0"));
        assert!(block.get("transform").is_none());
        assert_eq!(
            sorted_rows(block["values"].clone()),
            vec![json!({"a": 1, "avg_b": 3.0}), json!({"a": 2, "avg_b": 10.0})]
        );
    }

    #[tokio::test]
    async fn test_uncompiled_spec_is_ignored() {
        let (_, session) = session(SessionConfig::default());
        assert!(session.compile_spec(&json!({"mark": "bar"})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_extract_sql() {
        let (_, session) = session(SessionConfig::default());
        let handle = cars(&session).await;

        let statements = session.extract_sql(&compiled(&handle)).unwrap();
        let names: Vec<_> = statements.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["data_0"]);
        assert!(statements[0].1.contains("GROUP BY"), "{}", statements[0].1);
    }

    #[tokio::test]
    async fn test_reregistered_table_gets_new_handle() {
        let (_, session) = session(SessionConfig::default());
        let rows = |values: Value| VegaQueryTable::from_json(&values).unwrap();
        let first = session
            .register_table("cars", rows(json!([{"a": 1}])))
            .await
            .unwrap();
        let second = session
            .register_table("cars", rows(json!([{"a": 7}, {"a": 8}])))
            .await
            .unwrap();
        assert_ne!(first, second);

        let query = |handle: &str| QueryRequest {
            handle: handle.to_string(),
            transform: vec![],
            bindings: Map::new(),
        };
        assert_eq!(
            session.handle_query(&query(&first)).await.unwrap(),
            json!([{"a": 1}])
        );
        assert_eq!(
            session.handle_query(&query(&second)).await.unwrap(),
            json!([{"a": 7}, {"a": 8}])
        );
    }

    #[tokio::test]
    async fn test_close_clears_registry() {
        let (_, session) = session(SessionConfig::default());
        let handle = cars(&session).await;
        session.close().unwrap();
        assert!(matches!(
            session.resolve(&handle).unwrap_err(),
            VegaQueryError::LookupError(..)
        ));
    }
}
