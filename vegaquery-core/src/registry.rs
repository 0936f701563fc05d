use crate::error::{Result, VegaQueryError};
use ahash::RandomState;
use datafusion_expr::LogicalPlan;
use std::collections::HashMap;

pub const DEFAULT_NAME_PREFIX: &str = "ibis-";

/// Session scoped mapping from handle to query expression.
///
/// Handles are derived from a fixed-seed hash of the plan, so registering an equal plan twice
/// yields the same handle. Entries are never mutated: transforms build new plans that get
/// their own handles.
#[derive(Debug, Clone)]
pub struct ExpressionRegistry {
    name_prefix: String,
    expressions: HashMap<String, LogicalPlan>,
}

impl Default for ExpressionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PREFIX)
    }
}

impl ExpressionRegistry {
    pub fn new(name_prefix: &str) -> Self {
        Self {
            name_prefix: name_prefix.to_string(),
            expressions: HashMap::new(),
        }
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn handle_for(&self, plan: &LogicalPlan) -> String {
        let hash = RandomState::with_seed(123).hash_one(plan);
        format!("{}{hash}", self.name_prefix)
    }

    /// Issue the handle of `plan`. Fails if the handle is already bound to a different plan.
    pub fn register(&mut self, plan: LogicalPlan) -> Result<String> {
        let handle = self.handle_for(&plan);
        self.bind(handle.clone(), plan)?;
        Ok(handle)
    }

    fn bind(&mut self, handle: String, plan: LogicalPlan) -> Result<()> {
        match self.expressions.get(&handle) {
            Some(existing) if existing == &plan => Ok(()),
            Some(_) => Err(VegaQueryError::internal(format!(
                "Handle {handle} is already bound to a different query expression"
            ))),
            None => {
                log::debug!("Registered query expression {handle}");
                self.expressions.insert(handle, plan);
                Ok(())
            }
        }
    }

    /// Look up the expression behind a handle. Unknown handles usually mean the chart was
    /// produced by an earlier session.
    pub fn resolve(&self, handle: &str) -> Result<&LogicalPlan> {
        self.expressions.get(handle).ok_or_else(|| {
            VegaQueryError::lookup(format!(
                "No query expression registered for handle {handle:?}"
            ))
        })
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.expressions.contains_key(handle)
    }

    pub fn evict(&mut self, handle: &str) -> Option<LogicalPlan> {
        let evicted = self.expressions.remove(handle);
        if evicted.is_some() {
            log::debug!("Evicted query expression {handle}");
        }
        evicted
    }

    /// Drop every registered expression, used on session teardown
    pub fn clear(&mut self) {
        log::debug!("Clearing {} query expressions", self.expressions.len());
        self.expressions.clear();
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    pub fn handles(&self) -> Vec<String> {
        let mut handles: Vec<_> = self.expressions.keys().cloned().collect();
        handles.sort();
        handles
    }
}
