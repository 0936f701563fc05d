use crate::transform::{TransformContext, TransformTrait};
use datafusion::prelude::DataFrame;
use vegaquery_common::error::Result;
use vegaquery_core::spec::transform::groupby::GroupbyTransformSpec;

impl TransformTrait for GroupbyTransformSpec {
    fn apply(&self, dataframe: DataFrame, context: &mut TransformContext) -> Result<DataFrame> {
        let pending = context.pending_groupby.get_or_insert_with(Vec::new);
        for field in self.fields() {
            if !pending.contains(&field) {
                pending.push(field);
            }
        }
        Ok(dataframe)
    }
}
