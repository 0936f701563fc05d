use datafusion::execution::SessionStateBuilder;
use datafusion::execution::{config::SessionConfig, runtime_env::RuntimeEnvBuilder};
use datafusion::prelude::SessionContext;
use vegaquery_common::error::Result;

pub fn make_datafusion_context() -> Result<SessionContext> {
    let mut config = SessionConfig::new();

    let options = config.options_mut();
    options.optimizer.skip_failed_rules = true;

    let runtime = RuntimeEnvBuilder::new().build_arc()?;

    let session_state = SessionStateBuilder::new()
        .with_config(config)
        .with_runtime_env(runtime)
        .with_default_features()
        .build();

    Ok(SessionContext::new_with_state(session_state))
}
