use crate::expression::compiler::config::CompilationConfig;
use crate::transform::aggregate::distinct_groups;
use crate::transform::{TransformContext, TransformTrait};
use datafusion::prelude::DataFrame;
use vegaquery_common::error::{Result, ResultWithContext};
use vegaquery_core::spec::transform::TransformSpec;

/// Apply `transforms` in order. A groupby that no aggregate consumes leaves the distinct group
/// keys.
pub fn apply_transforms(
    dataframe: DataFrame,
    transforms: &[TransformSpec],
    config: &CompilationConfig,
) -> Result<DataFrame> {
    let mut context = TransformContext {
        config: config.clone(),
        pending_groupby: None,
    };

    let mut result = dataframe;
    for (i, tx) in transforms.iter().enumerate() {
        result = tx
            .apply(result, &mut context)
            .with_context(|| format!("Failed to apply {} transform {i}", tx.kind()))?;
    }

    match context.pending_groupby.take() {
        Some(groupby) => distinct_groups(result, &groupby),
        None => Ok(result),
    }
}
