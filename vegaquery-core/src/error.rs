pub use vegaquery_common::error::*;
