#[macro_use]
extern crate lazy_static;

pub mod adapter;
pub mod connection;
pub mod error;
pub mod expression;
pub mod mimebundle;
pub mod planning;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod spec;

pub use vegaquery_common::arrow;
pub use vegaquery_common::data;
pub use vegaquery_common::datafusion_common;
pub use vegaquery_common::datafusion_expr;
