#[macro_use]
extern crate lazy_static;

pub mod comm;
pub mod data;
pub mod datafusion;
pub mod executor;
pub mod expression;
pub mod plan_executor;
pub mod session;
pub mod sql;
pub mod transform;
