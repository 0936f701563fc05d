use crate::expression::compiler::compile_str;
use crate::transform::{TransformContext, TransformTrait};
use datafusion::prelude::DataFrame;
use vegaquery_common::error::{Result, ResultWithContext};
use vegaquery_core::spec::transform::formula::FormulaTransformSpec;

impl TransformTrait for FormulaTransformSpec {
    fn apply(&self, dataframe: DataFrame, context: &mut TransformContext) -> Result<DataFrame> {
        let expr = compile_str(&self.expr, &context.config, dataframe.schema())
            .with_context(|| format!("Failed to compile formula {:?}", self.expr))?;
        Ok(dataframe.with_column(&self.as_, expr)?)
    }
}
