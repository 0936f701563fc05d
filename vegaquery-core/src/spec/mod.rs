pub mod chart;
pub mod data;
pub mod signal;
pub mod transform;
