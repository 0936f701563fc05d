pub mod prune;
pub mod rewrite;

use crate::error::Result;
use crate::planning::prune::prune_unreferenced;
use crate::planning::rewrite::SpecRewriter;
use crate::registry::ExpressionRegistry;
use crate::spec::chart::ChartSpec;

/// Replace native transforms on registry-backed data with query descriptors, then drop the data
/// blocks that are no longer reachable
pub fn rewrite_spec(spec: &ChartSpec, registry: &ExpressionRegistry) -> Result<ChartSpec> {
    let is_handle = |name: &str| registry.contains(name);
    let rewritten = SpecRewriter::new(&is_handle).rewrite(spec)?;
    prune_unreferenced(&rewritten)
}
