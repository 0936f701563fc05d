pub mod aggregate;
pub mod filter;
pub mod formula;
pub mod groupby;
pub mod pipeline;

use crate::expression::compiler::config::CompilationConfig;
use datafusion::prelude::DataFrame;
use vegaquery_common::error::Result;
use vegaquery_core::spec::transform::TransformSpec;

/// State threaded through a transform list
#[derive(Clone, Debug, Default)]
pub struct TransformContext {
    pub config: CompilationConfig,

    /// Grouping fields of a standalone groupby, waiting for the aggregate that consumes them
    pub pending_groupby: Option<Vec<String>>,
}

pub trait TransformTrait {
    fn apply(&self, dataframe: DataFrame, context: &mut TransformContext) -> Result<DataFrame>;
}

impl TransformTrait for TransformSpec {
    fn apply(&self, dataframe: DataFrame, context: &mut TransformContext) -> Result<DataFrame> {
        match self {
            TransformSpec::Groupby(tx) => tx.apply(dataframe, context),
            TransformSpec::Aggregate(tx) => tx.apply(dataframe, context),
            TransformSpec::Filter(tx) => tx.apply(dataframe, context),
            TransformSpec::Formula(tx) => tx.apply(dataframe, context),
            TransformSpec::Unsupported(value) => {
                log::warn!("Skipping unsupported {} transform: {value}", self.kind());
                Ok(dataframe)
            }
        }
    }
}
