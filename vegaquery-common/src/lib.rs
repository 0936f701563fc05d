pub mod column;
pub mod data;
pub mod datatypes;
pub mod error;

pub use arrow;
pub use datafusion_common;
pub use datafusion_expr;
